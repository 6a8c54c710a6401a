//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use textpoll_core::phone;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    /// `tracing` directive list for the subscriber's `EnvFilter`, e.g.
    /// `info` or `info,sqlx=warn`.
    pub log_level: String,
    /// Shared secret the webhook provider signs request bodies with.
    pub webhook_signing_secret: String,
    /// Shared secret for bearer tokens (author tokens from the identity
    /// provider, and the voter-scoped tokens this service mints).
    pub jwt_secret: String,
    /// The pool of E.164 numbers polls can bind for SMS voting.
    pub phone_numbers: Vec<String>,
    pub cors_origin: String,
    pub sms_api_url: Option<String>,
    pub sms_account_sid: Option<String>,
    pub sms_auth_token: Option<String>,
    /// The number outbound verification codes are sent from.
    pub sms_from_number: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        // Directive lists like `info,sqlx=warn` pass through verbatim;
        // `EnvFilter` interprets them at subscriber setup.
        let log_level = Self::parse_log_directives(
            &std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        )?;

        // --- Load Secrets ---
        // An empty secret would make every signature verify against an
        // empty key, so blank counts as missing.
        let webhook_signing_secret = require_non_empty("WEBHOOK_SIGNING_SECRET")?;
        let jwt_secret = require_non_empty("JWT_SECRET")?;

        // --- Load the Phone Pool ---
        // A comma-separated list; every entry must normalize to E.164 so
        // pool membership checks compare canonical forms.
        let phone_numbers = match std::env::var("PHONE_NUMBERS") {
            Ok(raw) => Self::parse_phone_pool(&raw)?,
            Err(_) => Vec::new(),
        };

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load SMS Provider Settings (as optional) ---
        let sms_api_url = std::env::var("SMS_API_URL").ok();
        let sms_account_sid = std::env::var("SMS_ACCOUNT_SID").ok();
        let sms_auth_token = std::env::var("SMS_AUTH_TOKEN").ok();
        let sms_from_number = match std::env::var("SMS_FROM_NUMBER") {
            Ok(raw) => Some(phone::stored_form(&raw).map_err(|e| {
                ConfigError::InvalidValue("SMS_FROM_NUMBER".to_string(), e.to_string())
            })?),
            Err(_) => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            webhook_signing_secret,
            jwt_secret,
            phone_numbers,
            cors_origin,
            sms_api_url,
            sms_account_sid,
            sms_auth_token,
            sms_from_number,
        })
    }

    fn parse_log_directives(raw: &str) -> Result<String, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                "directive list is empty".to_string(),
            ));
        }
        Ok(raw.to_string())
    }

    fn parse_phone_pool(raw: &str) -> Result<Vec<String>, ConfigError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                phone::stored_form(entry).map_err(|e| {
                    ConfigError::InvalidValue("PHONE_NUMBERS".to_string(), e.to_string())
                })
            })
            .collect()
    }
}

fn require_non_empty(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directive_lists_pass_through_verbatim() {
        assert_eq!(
            Config::parse_log_directives("info,sqlx=warn").unwrap(),
            "info,sqlx=warn"
        );
    }

    #[test]
    fn blank_log_directives_are_a_config_error() {
        assert!(matches!(
            Config::parse_log_directives("  "),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn pool_entries_are_normalized_to_e164() {
        let pool = Config::parse_phone_pool("+1 555 000 1111, +46701234567").unwrap();
        assert_eq!(pool, vec!["+15550001111", "+46701234567"]);
    }

    #[test]
    fn empty_pool_entries_are_skipped() {
        let pool = Config::parse_phone_pool(" , ").unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn malformed_pool_entry_is_a_config_error() {
        assert!(matches!(
            Config::parse_phone_pool("+15550001111,bogus"),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }
}
