use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::coupons::Category;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which page renderer backs the scrape pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// Headless Chromium driven over `DevTools`.
    Browser,
    /// Plain HTTP fetch with browser-like headers; no script execution.
    Http,
}

/// Immutable settings for one scrape session.
///
/// Built once at startup and passed by reference (or `Arc`) into every
/// pipeline component; nothing reads the environment after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// Origin of the coupon site, without a trailing slash.
    pub base_url: String,
    pub renderer: RendererKind,
    pub browser_executable: Option<PathBuf>,
    pub browser_headless: bool,
    pub user_agent: String,
    pub categories: Vec<Category>,
    /// Maximum domains in flight at once within a batch.
    pub concurrent_domains: usize,
    /// Domains per batch.
    pub batch_size: usize,
    /// Additional whole-domain attempts after the first failure.
    pub domain_retries: u32,
    pub retry_backoff_ms: u64,
    pub navigation_timeout_ms: u64,
    pub reveal_timeout_ms: u64,
    /// Upper bound for waiting on the code element inside a reveal page.
    pub reveal_wait_selector_ms: u64,
    /// Upper bound for one attempt at one domain, reveals included.
    pub domain_timeout_ms: u64,
    pub reveal_pool_size: usize,
    pub reveal_delay_ms: u64,
    pub inter_batch_delay_ms: u64,
    pub inter_category_delay_ms: u64,
}

pub const DEFAULT_BASE_URL: &str = "https://couponfollow.com";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            renderer: RendererKind::Browser,
            browser_executable: None,
            browser_headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            categories: Category::all(),
            concurrent_domains: 5,
            batch_size: 5,
            domain_retries: 2,
            retry_backoff_ms: 3_000,
            navigation_timeout_ms: 30_000,
            reveal_timeout_ms: 10_000,
            reveal_wait_selector_ms: 5_000,
            domain_timeout_ms: 180_000,
            reveal_pool_size: 5,
            reveal_delay_ms: 300,
            inter_batch_delay_ms: 2_000,
            inter_category_delay_ms: 10_000,
        }
    }
}

impl ScrapeConfig {
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    #[must_use]
    pub fn reveal_timeout(&self) -> Duration {
        Duration::from_millis(self.reveal_timeout_ms)
    }

    #[must_use]
    pub fn reveal_wait_selector(&self) -> Duration {
        Duration::from_millis(self.reveal_wait_selector_ms)
    }

    #[must_use]
    pub fn domain_timeout(&self) -> Duration {
        Duration::from_millis(self.domain_timeout_ms)
    }

    /// Number of domains processed concurrently inside one batch.
    #[must_use]
    pub fn batch_concurrency(&self) -> usize {
        self.concurrent_domains.min(self.batch_size).max(1)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scrape: ScrapeConfig,
    pub scrape_now_enabled: bool,
    pub sweep_cron: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scrape", &self.scrape)
            .field("scrape_now_enabled", &self.scrape_now_enabled)
            .field("sweep_cron", &self.sweep_cron)
            .finish()
    }
}
