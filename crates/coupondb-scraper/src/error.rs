use thiserror::Error;

/// Failure of a single page render. Always recoverable by retrying.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    #[error("could not open a render context: {0}")]
    ContextUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("scraping {domain} exceeded the {timeout_ms} ms domain timeout")]
    DomainTimeout { domain: String, timeout_ms: u64 },

    #[error(transparent)]
    Sink(#[from] coupondb_core::SinkError),

    #[error("renderer failed to start: {0}")]
    RendererStartup(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("all {attempted} domains failed; no coupons were collected")]
    AllDomainsFailed { attempted: usize },
}
