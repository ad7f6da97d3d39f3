//! Script-free renderer backed by `reqwest`.
//!
//! Useful against fixture servers and for sites whose coupon markup is
//! server-rendered. Resource blocking and wait conditions are no-ops: only
//! the document itself is fetched.

use std::time::Duration;

use async_trait::async_trait;
use coupondb_core::ScrapeConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use super::stealth;
use super::{Document, RenderContext, RenderOptions, Renderer};
use crate::error::{RenderError, ScraperError};

pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Builds a renderer sending browser-like headers with the configured
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(stealth::ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(stealth::ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.navigation_timeout())
            .cookie_store(true)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn acquire(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        Ok(Box::new(HttpContext {
            client: self.client.clone(),
        }))
    }
}

struct HttpContext {
    client: Client,
}

#[async_trait]
impl RenderContext for HttpContext {
    async fn navigate(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Document, RenderError> {
        let failed = |reason: String| RenderError::NavigationError {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderError::NavigationTimeout {
                        url: url.to_string(),
                        timeout_ms: u64::try_from(options.timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    }
                } else {
                    failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        let html = response.text().await.map_err(|e| failed(e.to_string()))?;
        tracing::debug!(url, bytes = html.len(), "fetched document");
        Ok(Document::new(url, html))
    }

    async fn close(self: Box<Self>) {}
}
