//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults that match a small single-process deployment.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// One named rate window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateRule {
    pub window_secs: u64,
    pub max_requests: usize,
}

impl RateRule {
    pub const fn new(window_secs: u64, max_requests: usize) -> Self {
        RateRule {
            window_secs,
            max_requests,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Storefront service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the SQLite database file.
    pub database_path: String,

    /// Overall per-actor request limit, applied before any operation.
    pub overall_limit: RateRule,

    /// Checkout attempts per actor.
    pub order_limit: RateRule,

    /// Discount code applications per actor.
    pub discount_limit: RateRule,

    /// Cart mutations per actor.
    pub cart_limit: RateRule,

    /// Row cap for listings (orders, products, codes).
    pub list_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            database_path: "bazaar.db".to_string(),
            overall_limit: RateRule::new(10, 10),
            order_limit: RateRule::new(3600, 3),
            discount_limit: RateRule::new(60, 5),
            cart_limit: RateRule::new(60, 20),
            list_limit: 50,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ServiceConfig::default();

        Ok(ServiceConfig {
            database_path: env::var("BAZAAR_DB_PATH").unwrap_or(defaults.database_path),
            overall_limit: rate_rule("BAZAAR_OVERALL", defaults.overall_limit)?,
            order_limit: rate_rule("BAZAAR_ORDER", defaults.order_limit)?,
            discount_limit: rate_rule("BAZAAR_DISCOUNT", defaults.discount_limit)?,
            cart_limit: rate_rule("BAZAAR_CART", defaults.cart_limit)?,
            list_limit: parse_var("BAZAAR_LIST_LIMIT", defaults.list_limit)?,
        })
    }
}

fn rate_rule(prefix: &str, default: RateRule) -> Result<RateRule, ConfigError> {
    Ok(RateRule {
        window_secs: parse_var(&format!("{prefix}_WINDOW_SECS"), default.window_secs)?,
        max_requests: parse_var(&format!("{prefix}_MAX_REQUESTS"), default.max_requests)?,
    })
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
