//! Page renderer adapter.
//!
//! A [`Renderer`] hands out exclusive [`RenderContext`]s (a browser tab, or a
//! lightweight HTTP session) that navigate to a URL and return the resulting
//! [`Document`]. Callers hold contexts through a [`ContextLease`], which closes
//! the context when released explicitly and, as a last resort, when dropped
//! mid-flight (for example when a domain-level timeout cancels the future).

#[cfg(feature = "browser")]
mod browser;
mod http;
pub(crate) mod stealth;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coupondb_core::{RendererKind, ScrapeConfig};
use scraper::Html;

use crate::error::{RenderError, ScraperError};

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use http::HttpRenderer;

/// A rendered page snapshot.
///
/// Holds serialized HTML rather than a parsed tree so that it can cross
/// `.await` points and task boundaries; call [`Document::parse`] inside
/// synchronous extraction code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// URL the page was requested from.
    pub url: String,
    pub html: String,
}

impl Document {
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    #[must_use]
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Document loaded and no new sub-resources for a quiet period.
    NetworkIdle,
    /// `DOMContentLoaded` fired.
    DomReady,
}

/// Sub-resource classes that can be blocked during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Image,
    Font,
    Media,
    Stylesheet,
}

impl ResourceType {
    pub const NON_ESSENTIAL: [ResourceType; 4] = [
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Media,
        ResourceType::Stylesheet,
    ];

    /// URL glob patterns matching this resource class.
    #[must_use]
    pub fn url_patterns(self) -> &'static [&'static str] {
        match self {
            ResourceType::Image => &[
                "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.avif",
            ],
            ResourceType::Font => &["*.woff", "*.woff2", "*.ttf", "*.otf", "*.eot"],
            ResourceType::Media => &["*.mp4", "*.webm", "*.mp3", "*.ogg", "*.wav", "*.m3u8"],
            ResourceType::Stylesheet => &["*.css"],
        }
    }
}

/// Bounded wait for an element to appear after navigation completes.
///
/// A missing element is not an error: extraction runs on whatever rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorWait {
    pub selector: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub wait: WaitCondition,
    pub timeout: Duration,
    pub blocked: Vec<ResourceType>,
    pub wait_for_selector: Option<SelectorWait>,
}

impl RenderOptions {
    /// Category listing pages stream their merchant links in; wait for the
    /// network to settle.
    #[must_use]
    pub fn listing(config: &ScrapeConfig) -> Self {
        Self {
            wait: WaitCondition::NetworkIdle,
            timeout: config.navigation_timeout(),
            blocked: ResourceType::NON_ESSENTIAL.to_vec(),
            wait_for_selector: None,
        }
    }

    /// Merchant offer pages are high volume; DOM ready is enough.
    #[must_use]
    pub fn offers(config: &ScrapeConfig) -> Self {
        Self {
            wait: WaitCondition::DomReady,
            timeout: config.navigation_timeout(),
            blocked: ResourceType::NON_ESSENTIAL.to_vec(),
            wait_for_selector: None,
        }
    }

    /// Reveal modals are tiny; the code element is awaited with a bound
    /// strictly below the reveal timeout.
    #[must_use]
    pub fn reveal(config: &ScrapeConfig, code_selector: &str) -> Self {
        Self {
            wait: WaitCondition::DomReady,
            timeout: config.reveal_timeout(),
            blocked: ResourceType::NON_ESSENTIAL.to_vec(),
            wait_for_selector: Some(SelectorWait {
                selector: code_selector.to_string(),
                timeout: config.reveal_wait_selector(),
            }),
        }
    }

    /// Every URL glob that should be refused for this render.
    #[must_use]
    pub fn blocked_url_patterns(&self) -> Vec<String> {
        self.blocked
            .iter()
            .flat_map(|r| r.url_patterns().iter().map(|p| (*p).to_string()))
            .collect()
    }
}

/// Source of render contexts. Implementations must be shareable across tasks.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Opens a new exclusive render context.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContextUnavailable`] if no context can be opened.
    async fn acquire(&self) -> Result<Box<dyn RenderContext>, RenderError>;

    /// Releases process-level resources. Contexts must not be acquired
    /// afterwards.
    async fn shutdown(&self) {}
}

/// One exclusively-owned page (tab) that can be navigated repeatedly.
#[async_trait]
pub trait RenderContext: Send {
    /// Navigates to `url` and snapshots the resulting document.
    ///
    /// Implementations need not enforce `options.timeout` themselves; the
    /// [`ContextLease`] and pool wrappers do.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NavigationError`] on transport or DOM failures.
    async fn navigate(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Document, RenderError>;

    /// Releases the underlying resources. Must not fail.
    async fn close(self: Box<Self>);
}

/// Runs `navigate` under `options.timeout`, mapping expiry to
/// [`RenderError::NavigationTimeout`].
pub(crate) async fn navigate_with_timeout(
    context: &mut dyn RenderContext,
    url: &str,
    options: &RenderOptions,
) -> Result<Document, RenderError> {
    match tokio::time::timeout(options.timeout, context.navigate(url, options)).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Closes a context from a synchronous drop path by spawning onto the
/// current runtime.
pub(crate) fn close_detached(context: Box<dyn RenderContext>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { context.close().await });
        }
        Err(_) => {
            tracing::warn!("render context dropped outside a tokio runtime; it was not closed");
        }
    }
}

/// Exclusive ownership of one render context for the duration of an operation.
pub struct ContextLease {
    context: Option<Box<dyn RenderContext>>,
}

impl ContextLease {
    /// Acquires a fresh context from `renderer`.
    ///
    /// # Errors
    ///
    /// Propagates the renderer's acquisition error.
    pub async fn acquire(renderer: &dyn Renderer) -> Result<Self, RenderError> {
        let context = renderer.acquire().await?;
        Ok(Self {
            context: Some(context),
        })
    }

    /// Navigates the leased context, bounded by `options.timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NavigationTimeout`] when the timeout elapses, or
    /// the context's own navigation error.
    pub async fn navigate(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Document, RenderError> {
        let context = self
            .context
            .as_deref_mut()
            .ok_or_else(|| RenderError::ContextUnavailable("lease already released".into()))?;
        navigate_with_timeout(context, url, options).await
    }

    /// Closes the context and waits for the close to finish.
    pub async fn release(mut self) {
        if let Some(context) = self.context.take() {
            context.close().await;
        }
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            close_detached(context);
        }
    }
}

/// Builds the renderer selected by `config.renderer`.
///
/// # Errors
///
/// Returns [`ScraperError::RendererStartup`] if the browser cannot be
/// launched or the crate was built without the `browser` feature, and
/// [`ScraperError::Http`] if the HTTP client cannot be built.
pub async fn build_renderer(config: &ScrapeConfig) -> Result<Arc<dyn Renderer>, ScraperError> {
    match config.renderer {
        RendererKind::Http => Ok(Arc::new(HttpRenderer::new(config)?)),
        #[cfg(feature = "browser")]
        RendererKind::Browser => Ok(Arc::new(BrowserRenderer::launch(config).await?)),
        #[cfg(not(feature = "browser"))]
        RendererKind::Browser => Err(ScraperError::RendererStartup(
            "built without the `browser` feature; set COUPONDB_RENDERER=http".to_string(),
        )),
    }
}

/// Renders a single URL in a fresh context, releasing it on every exit path.
///
/// # Errors
///
/// Returns the acquisition or navigation error; the context is closed either way.
pub async fn render_page(
    renderer: &dyn Renderer,
    url: &str,
    options: &RenderOptions,
) -> Result<Document, RenderError> {
    let mut lease = ContextLease::acquire(renderer).await?;
    let result = lease.navigate(url, options).await;
    lease.release().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_waits_for_network_idle_and_blocks_assets() {
        let config = ScrapeConfig::default();
        let options = RenderOptions::listing(&config);
        assert_eq!(options.wait, WaitCondition::NetworkIdle);
        assert_eq!(options.timeout, config.navigation_timeout());
        assert_eq!(options.blocked.len(), 4);
        assert!(options.wait_for_selector.is_none());
    }

    #[test]
    fn reveal_selector_wait_is_shorter_than_reveal_timeout() {
        let config = ScrapeConfig::default();
        let options = RenderOptions::reveal(&config, "input#code");
        assert_eq!(options.wait, WaitCondition::DomReady);
        let wait = options.wait_for_selector.expect("reveal waits for the code");
        assert!(wait.timeout < options.timeout);
        assert!(options.timeout < config.domain_timeout());
    }

    #[test]
    fn blocked_patterns_cover_every_blocked_type() {
        let options = RenderOptions::offers(&ScrapeConfig::default());
        let patterns = options.blocked_url_patterns();
        assert!(patterns.contains(&"*.png".to_string()));
        assert!(patterns.contains(&"*.woff2".to_string()));
        assert!(patterns.contains(&"*.mp4".to_string()));
        assert!(patterns.contains(&"*.css".to_string()));
    }
}
