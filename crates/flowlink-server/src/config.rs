//! Environment-based configuration.
//!
//! Loads `.env` if present, then reads variables with required/default
//! helpers. Secrets stay out of the config file format entirely.

use std::env;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime configuration for the server and CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the SQLite database file.
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Base URL of the sync-execution service.
    pub execution_url: String,
    /// Optional bearer token sent to the execution service.
    pub execution_auth_token: Option<String>,
    /// Public base URL used to build task status/log links.
    pub public_url: String,
    /// Shared secret accepted for service-to-service run requests.
    pub service_secret: Option<String>,
    /// JSON object mapping user tokens to the workspace ids they may run
    /// syncs in, e.g. `{"tok1": ["ws_1"]}`.
    pub user_tokens: Option<String>,
    /// OAuth token endpoint for credential refresh; unset means stored
    /// credentials pass through unchanged.
    pub oauth_token_url: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is unset or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_path: get_var_or("FLOWLINK_DB", "flowlink.db"),
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_var_or("PORT", "8700")
                .parse()
                .map_err(|e| ConfigError::Invalid {
                    key: "PORT",
                    message: format!("{e}"),
                })?,
            execution_url: get_var("EXECUTION_URL")?,
            execution_auth_token: get_var_opt("EXECUTION_AUTH_TOKEN"),
            public_url: get_var_or("PUBLIC_URL", "http://localhost:8700"),
            service_secret: get_var_opt("SERVICE_SECRET"),
            user_tokens: get_var_opt("USER_TOKENS"),
            oauth_token_url: get_var_opt("OAUTH_TOKEN_URL"),
            oauth_client_id: get_var_opt("OAUTH_CLIENT_ID"),
            oauth_client_secret: get_var_opt("OAUTH_CLIENT_SECRET"),
        })
    }

    /// Listen address for the HTTP server.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn get_var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn from_env_with_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("EXECUTION_URL", "http://controller:7077");
        env::remove_var("PORT");
        env::remove_var("SERVICE_SECRET");

        let config = AppConfig::from_env().expect("should parse config");
        assert_eq!(config.execution_url, "http://controller:7077");
        assert_eq!(config.port, 8700);
        assert!(config.service_secret.is_none());

        env::remove_var("EXECUTION_URL");
    }

    #[test]
    fn from_env_requires_execution_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("EXECUTION_URL");
        assert!(AppConfig::from_env().is_err());
    }

    #[test]
    fn bind_addr_formats() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("EXECUTION_URL", "http://controller:7077");
        env::set_var("HOST", "127.0.0.1");
        env::set_var("PORT", "9000");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");

        env::remove_var("EXECUTION_URL");
        env::remove_var("HOST");
        env::remove_var("PORT");
    }
}
