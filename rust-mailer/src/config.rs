//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup into a [`Config`] that is then passed
//! explicitly to the dispatcher and the web handlers.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Default Postmark API host.
pub const DEFAULT_API_HOST: &str = "api.postmarkapp.com";

/// Default record database, created next to the binary on first use.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://postmark.db";

/// Maximum number of messages Postmark accepts in one batch call.
pub const BATCH_SIZE: usize = 500;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("POSTMARK_API_KEY must be set")]
    MissingApiKey,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postmark server token sent as `X-Postmark-Server-Token`
    pub api_key: String,

    /// Use https when talking to the provider
    pub use_ssl: bool,

    /// Host (optionally with port) of the provider API
    pub api_host: String,

    /// Sandbox mode: no network calls, every message succeeds
    pub test_mode: bool,

    /// Convert recoverable errors into neutral outcomes instead of raising them
    pub fail_silently: bool,

    /// Messages per batch call
    pub batch_size: usize,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Capacity of the post-send event channel feeding the recorder
    pub recorder_capacity: usize,

    /// Port for the web server to listen on
    pub port: u16,

    /// SQLite URL of the delivery and bounce record database
    pub database_url: String,
}

impl Config {
    /// Build a configuration with defaults for everything except the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Config {
            api_key: api_key.into(),
            use_ssl: false,
            api_host: DEFAULT_API_HOST.to_string(),
            test_mode: false,
            fail_silently: false,
            batch_size: BATCH_SIZE,
            request_timeout_ms: 10_000,
            recorder_capacity: 1024,
            port: 8080,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Fails only when `POSTMARK_API_KEY` is absent or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("POSTMARK_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let defaults = Config::new(api_key);

        Ok(Config {
            use_ssl: parse_flag("POSTMARK_SSL", defaults.use_ssl),

            api_host: env::var("POSTMARK_API_HOST")
                .ok()
                .map(|h| h.trim().trim_end_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.api_host),

            test_mode: parse_flag("POSTMARK_TEST_MODE", defaults.test_mode),

            fail_silently: parse_flag("POSTMARK_FAIL_SILENTLY", defaults.fail_silently),

            batch_size: defaults.batch_size,

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),

            recorder_capacity: env::var("RECORDER_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(defaults.recorder_capacity),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            database_url: env::var("DATABASE_URL")
                .ok()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.database_url),

            api_key: defaults.api_key,
        })
    }

    /// Base URL of the provider API, e.g. `https://api.postmarkapp.com`.
    pub fn api_base(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.api_host)
    }

    /// URL of the batch endpoint.
    pub fn batch_url(&self) -> String {
        format!("{}/email/batch", self.api_base())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a boolean flag like "true", "1", "yes" or "on".
fn parse_flag(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean flag, using default");
            default
        }
    }
}
