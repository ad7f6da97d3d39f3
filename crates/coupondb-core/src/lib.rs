pub mod app_config;
pub mod config;
pub mod coupons;
pub mod sink;

pub use app_config::{AppConfig, Environment, RendererKind, ScrapeConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use coupons::{
    is_placeholder_code, Category, CouponRecord, InvalidDomain, MerchantDomain, RawOffer,
    SENTINEL_CODE,
};
pub use sink::{CouponSink, SinkError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("inconsistent scrape timing: {0}")]
    InconsistentTiming(String),
}
