use std::time::Duration;

use serde::Deserialize;

use lk_core::batch::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY_LIMIT};
use lk_core::config::{Config, ConfigError};
use lk_core::retry::RetryPolicy;
use lk_vision::preprocess::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, ImageBounds};
use lk_vision::scanner::ScanOptions;

/// QR service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct QrConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port for the HTTP server (default 3114). Env var: `QR_PORT`.
    #[serde(default = "default_qr_port")]
    pub qr_port: u16,
    /// Base of the family portal; tokens are appended as `/f/<token>`.
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,
    /// Items per sub-batch for batch endpoints.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Items in flight at once inside a sub-batch.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_max_image_width")]
    pub max_image_width: u32,
    #[serde(default = "default_max_image_height")]
    pub max_image_height: u32,
    /// Graph API root, e.g. `https://graph.facebook.com/v19.0`.
    #[serde(default = "default_whatsapp_api_url")]
    pub whatsapp_api_url: String,
    #[serde(default)]
    pub whatsapp_phone_number_id: String,
    /// Bearer token; delivery is rejected without one.
    #[serde(default)]
    pub whatsapp_access_token: String,
    #[serde(default = "default_notify_max_attempts")]
    pub notify_max_attempts: u32,
    #[serde(default = "default_notify_base_delay_ms")]
    pub notify_base_delay_ms: u64,
    #[serde(default = "default_notify_backoff_factor")]
    pub notify_backoff_factor: u32,
}

/// Longest accepted cache TTL (30 days).
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted token lifetime (10 years).
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Longest accepted wait before the first notification retry (1 hour).
pub const MAX_NOTIFY_BASE_DELAY_MS: u64 = 60 * 60 * 1000;

impl Config for QrConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.token_ttl_days) {
            return Err(ConfigError::invalid(
                "token_ttl_days",
                format!("expected 1..={MAX_TOKEN_TTL_DAYS}, got {}", self.token_ttl_days),
            ));
        }
        if !(1..=MAX_CACHE_TTL_SECS).contains(&self.cache_ttl_secs) {
            return Err(ConfigError::invalid(
                "cache_ttl_secs",
                format!("expected 1..={MAX_CACHE_TTL_SECS}, got {}", self.cache_ttl_secs),
            ));
        }
        // tokio::time::interval panics on a zero period.
        if !(1..=MAX_CACHE_TTL_SECS).contains(&self.cache_sweep_interval_secs) {
            return Err(ConfigError::invalid(
                "cache_sweep_interval_secs",
                format!(
                    "expected 1..={MAX_CACHE_TTL_SECS}, got {}",
                    self.cache_sweep_interval_secs
                ),
            ));
        }
        if self.max_image_width == 0 || self.max_image_height == 0 {
            return Err(ConfigError::invalid(
                "max_image_width/max_image_height",
                "must be positive",
            ));
        }
        if self.notify_max_attempts == 0 {
            return Err(ConfigError::invalid("notify_max_attempts", "must be at least 1"));
        }
        if self.notify_base_delay_ms > MAX_NOTIFY_BASE_DELAY_MS {
            return Err(ConfigError::invalid(
                "notify_base_delay_ms",
                format!("at most {MAX_NOTIFY_BASE_DELAY_MS}"),
            ));
        }
        Ok(())
    }
}

fn default_qr_port() -> u16 {
    3114
}

fn default_portal_base_url() -> String {
    "http://localhost:3000".to_owned()
}

fn default_token_ttl_days() -> i64 {
    365
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_sweep_interval_secs() -> u64 {
    300
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_max_image_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_image_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_whatsapp_api_url() -> String {
    "https://graph.facebook.com/v19.0".to_owned()
}

fn default_notify_max_attempts() -> u32 {
    3
}

fn default_notify_base_delay_ms() -> u64 {
    1000
}

fn default_notify_backoff_factor() -> u32 {
    2
}

impl QrConfig {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn notify_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.notify_max_attempts,
            Duration::from_millis(self.notify_base_delay_ms),
            self.notify_backoff_factor,
        )
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            bounds: ImageBounds {
                max_width: self.max_image_width,
                max_height: self.max_image_height,
            },
            ..ScanOptions::default()
        }
    }
}
