//! Server configuration.
//!
//! Loaded once from environment variables (a `.env` file is read first when
//! present) and passed to handlers through `AppState`.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "tally-dev-secret-change-in-production";

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// HS256 signing key for session tokens
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Directory holding `receipt_<sale_id>.pdf` files
    pub receipts_dir: PathBuf,

    /// Front-end origin used to build links in emails
    pub public_base_url: String,

    /// CORS allow-list. Empty allows any origin.
    pub allowed_origins: Vec<String>,

    /// Mail relay endpoint. `None` logs mail instead of sending it.
    pub mail_relay_url: Option<String>,

    /// Sender address for outgoing mail
    pub mail_from: String,

    /// Verification link lifetime
    pub verification_ttl_hours: i64,

    /// Password reset link lifetime
    pub reset_ttl_minutes: i64,

    pub app_env: AppEnv,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let app_env = match env::var("APP_ENV").as_deref() {
            Ok("production") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if app_env == AppEnv::Production => {
                return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()))
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let config = ServerConfig {
            bind_addr: parse_var("BIND_ADDR", "0.0.0.0:8080")?,
            database_path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/tally.db".to_string()),
            ),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
            jwt_secret,
            jwt_lifetime_secs: parse_var("JWT_LIFETIME_SECS", "86400")?, // 1 day
            receipts_dir: PathBuf::from(
                env::var("RECEIPTS_DIR").unwrap_or_else(|_| "./data/receipts".to_string()),
            ),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            mail_relay_url: env::var("MAIL_RELAY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Tally POS <no-reply@tally.local>".to_string()),
            verification_ttl_hours: parse_var("VERIFICATION_TTL_HOURS", "24")?,
            reset_ttl_minutes: parse_var("RESET_TTL_MINUTES", "60")?,
            app_env,
        };

        if config.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// Configuration for tests: in-memory friendly, receipts under `receipts_dir`.
    pub fn for_tests(receipts_dir: impl Into<PathBuf>) -> Self {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_path: PathBuf::from(":memory:"),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_lifetime_secs: 3600,
            receipts_dir: receipts_dir.into(),
            public_base_url: "http://localhost:5173".to_string(),
            allowed_origins: Vec::new(),
            mail_relay_url: None,
            mail_from: "test@tally.local".to_string(),
            verification_ttl_hours: 24,
            reset_ttl_minutes: 60,
            app_env: AppEnv::Development,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" http://a.test, ,http://b.test "),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_parse_var_default() {
        let port: u32 = parse_var("TALLY_TEST_UNSET_VARIABLE", "42").unwrap();
        assert_eq!(port, 42);
    }
}
