//! Headless Chromium renderer over the `DevTools` protocol.
//!
//! One browser process is shared by every context; each context is a tab.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use coupondb_core::ScrapeConfig;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::stealth;
use super::{Document, RenderContext, RenderOptions, Renderer, WaitCondition};
use crate::error::{RenderError, ScraperError};

const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// Quiet period that counts as "network idle" on listing pages.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Extra time granted to the in-page selector poll before giving up on the
/// protocol round-trip.
const SELECTOR_WAIT_SLACK: Duration = Duration::from_millis(250);

pub struct BrowserRenderer {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
    user_agent: String,
}

impl BrowserRenderer {
    /// Launches a browser process using the configured executable, or the
    /// first Chromium found on a well-known path.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RendererStartup`] if no executable is found or
    /// the process fails to launch.
    pub async fn launch(config: &ScrapeConfig) -> Result<Self, ScraperError> {
        let executable = match &config.browser_executable {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                ScraperError::RendererStartup(
                    "no Chrome/Chromium executable found; set COUPONDB_BROWSER_EXECUTABLE"
                        .to_string(),
                )
            })?,
        };

        tracing::info!(
            executable = %executable.display(),
            headless = config.browser_headless,
            "launching browser"
        );

        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        if !config.browser_headless {
            builder = builder.with_head();
        }
        for arg in stealth::CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        let browser_config = builder.build().map_err(ScraperError::RendererStartup)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::RendererStartup(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn open_page(&self) -> Result<Page, chromiumoxide::error::CdpError> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await?
        };

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            stealth::STEALTH_SCRIPT,
        ))
        .await?;

        let mut user_agent = SetUserAgentOverrideParams::new(self.user_agent.clone());
        user_agent.accept_language = Some(stealth::ACCEPT_LANGUAGE.to_string());
        page.execute(user_agent).await?;
        page.execute(EnableParams::default()).await?;
        Ok(page)
    }
}

impl Drop for BrowserRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn find_chrome() -> Option<PathBuf> {
    CHROME_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

#[async_trait]
impl Renderer for BrowserRenderer {
    async fn acquire(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let page = self
            .open_page()
            .await
            .map_err(|e| RenderError::ContextUnavailable(e.to_string()))?;
        Ok(Box::new(BrowserContext {
            page: Some(page),
            blocked: None,
        }))
    }

    /// Closes the browser process. Open tabs are discarded.
    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
        tracing::info!("browser closed");
    }
}

struct BrowserContext {
    page: Option<Page>,
    /// Patterns currently applied to the tab, to skip redundant CDP calls.
    blocked: Option<Vec<String>>,
}

impl BrowserContext {
    async fn wait_until(&self, page: &Page, options: &RenderOptions) {
        let script = match options.wait {
            WaitCondition::DomReady => stealth::dom_ready_script(options.timeout),
            WaitCondition::NetworkIdle => {
                stealth::network_idle_script(options.timeout, NETWORK_QUIET)
            }
        };
        match page.evaluate(script).await {
            Ok(result) => {
                tracing::debug!(wait = ?options.wait, result = ?result.value(), "page settled");
            }
            Err(e) => tracing::debug!(error = %e, "wait script failed"),
        }
    }
}

#[async_trait]
impl RenderContext for BrowserContext {
    async fn navigate(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<Document, RenderError> {
        let failed = |reason: String| RenderError::NavigationError {
            url: url.to_string(),
            reason,
        };
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| RenderError::ContextUnavailable("page already closed".into()))?;

        let patterns = options.blocked_url_patterns();
        if self.blocked.as_ref() != Some(&patterns) {
            page.execute(SetBlockedUrLsParams::new(patterns.clone()))
                .await
                .map_err(|e| failed(e.to_string()))?;
            self.blocked = Some(patterns);
        }

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(failed)?;
        let navigated = page
            .execute(params)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if let Some(error_text) = navigated.result.error_text.clone() {
            return Err(failed(error_text));
        }

        self.wait_until(page, options).await;

        if let Some(wait) = &options.wait_for_selector {
            let script = stealth::selector_wait_script(&wait.selector, wait.timeout);
            let bound = wait.timeout + SELECTOR_WAIT_SLACK;
            match tokio::time::timeout(bound, page.evaluate(script)).await {
                Ok(Ok(result)) => {
                    if matches!(result.into_value::<bool>(), Ok(true)) {
                        tracing::debug!(selector = %wait.selector, "selector found");
                    } else {
                        tracing::debug!(selector = %wait.selector, "selector not found in time");
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(selector = %wait.selector, error = %e, "selector wait failed");
                }
                Err(_) => {
                    tracing::debug!(selector = %wait.selector, "timed out waiting for selector");
                }
            }
        }

        let html = page.content().await.map_err(|e| failed(e.to_string()))?;
        Ok(Document::new(url, html))
    }

    async fn close(mut self: Box<Self>) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "page close failed");
            }
        }
    }
}
