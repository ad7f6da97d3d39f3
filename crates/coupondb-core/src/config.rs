use crate::app_config::{AppConfig, Environment, RendererKind, ScrapeConfig};
use crate::coupons::Category;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or scrape timings are inconsistent.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files, which keeps it usable in tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or scrape timings are inconsistent.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

impl AppConfig {
    /// Returns the database URL, or an error naming the missing variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup without `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_nonzero_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
            },
        }
    };

    let database_url = lookup("DATABASE_URL").ok();
    let env = parse_environment(&or_default("COUPONDB_ENV", "development"))?;

    let bind_addr = or_default("COUPONDB_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("COUPONDB_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("COUPONDB_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("COUPONDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("COUPONDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("COUPONDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let defaults = ScrapeConfig::default();

    let base_url = or_default("COUPONDB_SITE_BASE_URL", &defaults.base_url)
        .trim_end_matches('/')
        .to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(invalid(
            "COUPONDB_SITE_BASE_URL",
            "must start with http:// or https://".to_string(),
        ));
    }

    let renderer = parse_renderer(&or_default("COUPONDB_RENDERER", "browser"))?;
    let browser_executable = lookup("COUPONDB_BROWSER_EXECUTABLE")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let categories = match lookup("COUPONDB_CATEGORIES") {
        Ok(raw) => parse_categories(&raw)?,
        Err(_) => defaults.categories.clone(),
    };

    let reveal_pool_size = parse_nonzero_usize("COUPONDB_REVEAL_POOL_SIZE", "5")?;
    if reveal_pool_size > 10 {
        return Err(invalid(
            "COUPONDB_REVEAL_POOL_SIZE",
            "must be between 1 and 10".to_string(),
        ));
    }

    let scrape = ScrapeConfig {
        base_url,
        renderer,
        browser_executable,
        browser_headless: parse_bool("COUPONDB_BROWSER_HEADLESS", true)?,
        user_agent: or_default("COUPONDB_USER_AGENT", &defaults.user_agent),
        categories,
        concurrent_domains: parse_nonzero_usize("COUPONDB_CONCURRENT_DOMAINS", "5")?,
        batch_size: parse_nonzero_usize("COUPONDB_BATCH_SIZE", "5")?,
        domain_retries: parse_u32("COUPONDB_DOMAIN_RETRIES", "2")?,
        retry_backoff_ms: parse_u64("COUPONDB_RETRY_BACKOFF_MS", "3000")?,
        navigation_timeout_ms: parse_u64("COUPONDB_NAVIGATION_TIMEOUT_MS", "30000")?,
        reveal_timeout_ms: parse_u64("COUPONDB_REVEAL_TIMEOUT_MS", "10000")?,
        reveal_wait_selector_ms: parse_u64("COUPONDB_REVEAL_WAIT_SELECTOR_MS", "5000")?,
        domain_timeout_ms: parse_u64("COUPONDB_DOMAIN_TIMEOUT_MS", "180000")?,
        reveal_pool_size,
        reveal_delay_ms: parse_u64("COUPONDB_REVEAL_DELAY_MS", "300")?,
        inter_batch_delay_ms: parse_u64("COUPONDB_INTER_BATCH_DELAY_MS", "2000")?,
        inter_category_delay_ms: parse_u64("COUPONDB_INTER_CATEGORY_DELAY_MS", "10000")?,
    };
    validate_timing(&scrape)?;

    let sweep_cron = lookup("COUPONDB_SWEEP_CRON")
        .ok()
        .filter(|s| !s.trim().is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scrape,
        scrape_now_enabled: parse_bool("COUPONDB_SCRAPE_NOW_ENABLED", true)?,
        sweep_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COUPONDB_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_renderer(s: &str) -> Result<RendererKind, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "browser" | "chrome" | "chromium" => Ok(RendererKind::Browser),
        "http" => Ok(RendererKind::Http),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COUPONDB_RENDERER".to_string(),
            reason: format!("unknown renderer \"{other}\"; expected \"browser\" or \"http\""),
        }),
    }
}

/// Parse a comma-separated category list, dropping duplicates but keeping order.
fn parse_categories(raw: &str) -> Result<Vec<Category>, ConfigError> {
    let mut categories: Vec<Category> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let category = token
            .parse::<Category>()
            .map_err(|reason| ConfigError::InvalidEnvVar {
                var: "COUPONDB_CATEGORIES".to_string(),
                reason,
            })?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "COUPONDB_CATEGORIES".to_string(),
            reason: "no categories listed".to_string(),
        });
    }
    Ok(categories)
}

/// A stalled reveal must never outlive the merchant it belongs to.
fn validate_timing(scrape: &ScrapeConfig) -> Result<(), ConfigError> {
    if scrape.reveal_wait_selector_ms >= scrape.reveal_timeout_ms {
        return Err(ConfigError::InconsistentTiming(format!(
            "reveal wait-for-selector ({} ms) must be shorter than the reveal timeout ({} ms)",
            scrape.reveal_wait_selector_ms, scrape.reveal_timeout_ms
        )));
    }
    if scrape.reveal_timeout_ms >= scrape.domain_timeout_ms {
        return Err(ConfigError::InconsistentTiming(format!(
            "reveal timeout ({} ms) must be shorter than the domain timeout ({} ms)",
            scrape.reveal_timeout_ms, scrape.domain_timeout_ms
        )));
    }
    if scrape.navigation_timeout_ms >= scrape.domain_timeout_ms {
        return Err(ConfigError::InconsistentTiming(format!(
            "navigation timeout ({} ms) must be shorter than the domain timeout ({} ms)",
            scrape.navigation_timeout_ms, scrape.domain_timeout_ms
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
