//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOUQ_API_BASE_URL` - Base URL of the catalog/order backend (e.g. `https://api.souq.dev/api`)
//!
//! ## Optional
//! - `SOUQ_DEFAULT_LOCALE` - Locale used until the user picks one (default: en)
//! - `SOUQ_STATE_PATH` - File persisting token and locale (default: .souq/session.json)
//! - `SOUQ_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SOUQ_RATE_LIMIT_DELAY_MS` - Pause after an HTTP 429 before surfacing it (default: 2000)
//! - `SOUQ_NAVIGATION_DELAY_MS` - Delay before leaving checkout after success (default: 3000)
//! - `SOUQ_DEFAULT_SHIPPING` - Shipping shown when the backend sends none (default: 0)
//! - `SOUQ_HTTP_DIAGNOSTICS` - Debug-log every request and response (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use souq_core::Locale;
use thiserror::Error;
use url::Url;

const DEFAULT_LOCALE: &str = "en";
const DEFAULT_STATE_PATH: &str = ".souq/session.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 2_000;
const DEFAULT_NAVIGATION_DELAY_MS: u64 = 3_000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL; request paths are appended to it
    pub api_base_url: Url,
    /// Locale used when none has been stored
    pub default_locale: Locale,
    /// Where the token and locale are persisted
    pub state_path: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Pause applied once after an HTTP 429
    pub rate_limit_delay: Duration,
    /// Delay between order success and navigation to the order view
    pub navigation_delay: Duration,
    /// Shipping amount used when the cart carries none
    pub default_shipping: Decimal,
    /// Whether requests and responses are debug-logged
    pub http_diagnostics: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for everything except the backend URL.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            default_locale: Locale::default(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_delay: Duration::from_millis(DEFAULT_RATE_LIMIT_DELAY_MS),
            navigation_delay: Duration::from_millis(DEFAULT_NAVIGATION_DELAY_MS),
            default_shipping: Decimal::ZERO,
            http_diagnostics: true,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = Url::parse(&get_required_env("SOUQ_API_BASE_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("SOUQ_API_BASE_URL".to_string(), e.to_string())
        })?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "SOUQ_API_BASE_URL".to_string(),
                format!("unsupported scheme '{}'", api_base_url.scheme()),
            ));
        }

        let default_locale = parse_env::<Locale>("SOUQ_DEFAULT_LOCALE", DEFAULT_LOCALE)?;
        let state_path = PathBuf::from(get_env_or_default("SOUQ_STATE_PATH", DEFAULT_STATE_PATH));
        let request_timeout = Duration::from_secs(parse_env::<u64>(
            "SOUQ_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )?);
        let rate_limit_delay = Duration::from_millis(parse_env::<u64>(
            "SOUQ_RATE_LIMIT_DELAY_MS",
            &DEFAULT_RATE_LIMIT_DELAY_MS.to_string(),
        )?);
        let navigation_delay = Duration::from_millis(parse_env::<u64>(
            "SOUQ_NAVIGATION_DELAY_MS",
            &DEFAULT_NAVIGATION_DELAY_MS.to_string(),
        )?);
        let default_shipping = parse_env::<Decimal>("SOUQ_DEFAULT_SHIPPING", "0")?;
        if default_shipping.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SOUQ_DEFAULT_SHIPPING".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let http_diagnostics = parse_bool_env("SOUQ_HTTP_DIAGNOSTICS", true)?;

        Ok(Self {
            api_base_url,
            default_locale,
            state_path,
            request_timeout,
            rate_limit_delay,
            navigation_delay,
            default_shipping,
            http_diagnostics,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag accepting the usual spellings.
fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match get_optional_env(key) {
        None => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: {raw}"))
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:8000/api").unwrap());
        assert_eq!(config.default_locale.as_str(), "en");
        assert_eq!(config.rate_limit_delay, Duration::from_secs(2));
        assert_eq!(config.navigation_delay, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.default_shipping, Decimal::ZERO);
        assert!(config.http_diagnostics);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("SOUQ_API_BASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SOUQ_API_BASE_URL"
        );

        let err =
            ConfigError::InvalidEnvVar("SOUQ_DEFAULT_SHIPPING".to_string(), "bad".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid environment variable SOUQ_DEFAULT_SHIPPING: bad"
        );
    }
}
