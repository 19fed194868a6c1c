//! Configuration management
//!
//! This module handles loading and parsing configuration for the guestbook.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The OAuth
//! client credentials have no usable default and are checked by
//! [`Config::validate`] at startup.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Identity provider configuration
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Login redirect destinations
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8788
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/guestbook.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// OAuth client configuration for the identity provider.
///
/// Endpoints default to GitHub. `redirect_uri` must match the callback URL
/// registered with the provider; it is used both when building the
/// authorization URL and when exchanging the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Sent on every provider request (GitHub rejects requests without one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Transport timeout for provider calls, in seconds
    #[serde(default = "default_oauth_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
            scope: default_scope(),
            user_agent: default_user_agent(),
            timeout_seconds: default_oauth_timeout(),
        }
    }
}

fn default_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

fn default_profile_url() -> String {
    "https://api.github.com/user".to_string()
}

fn default_scope() -> String {
    "read:user user:email".to_string()
}

fn default_user_agent() -> String {
    format!("guestbook/{}", env!("CARGO_PKG_VERSION"))
}

fn default_oauth_timeout() -> u64 {
    10
}

/// Where the browser is sent after the OAuth callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_redirect")]
    pub success_redirect: String,
    #[serde(default = "default_redirect")]
    pub failure_redirect: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            success_redirect: default_redirect(),
            failure_redirect: default_redirect(),
        }
    }
}

fn default_redirect() -> String {
    "/".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - GUESTBOOK_SERVER_HOST
    /// - GUESTBOOK_SERVER_PORT
    /// - GUESTBOOK_SERVER_CORS_ORIGIN
    /// - GUESTBOOK_DATABASE_DRIVER
    /// - GUESTBOOK_DATABASE_URL
    /// - GUESTBOOK_OAUTH_CLIENT_ID (or GITHUB_CLIENT_ID)
    /// - GUESTBOOK_OAUTH_CLIENT_SECRET (or GITHUB_CLIENT_SECRET)
    /// - GUESTBOOK_OAUTH_REDIRECT_URI (or GITHUB_REDIRECT_URI)
    /// - GUESTBOOK_OAUTH_TIMEOUT_SECONDS
    /// - GUESTBOOK_AUTH_SUCCESS_REDIRECT
    /// - GUESTBOOK_AUTH_FAILURE_REDIRECT
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check settings that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "oauth.client_id is required".to_string(),
            ));
        }
        if self.oauth.client_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "oauth.client_secret is required".to_string(),
            ));
        }
        if self.oauth.redirect_uri.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "oauth.redirect_uri is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("GUESTBOOK_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("GUESTBOOK_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("GUESTBOOK_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("GUESTBOOK_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("GUESTBOOK_DATABASE_URL") {
            self.database.url = url;
        }

        // OAuth configuration; the prefixed name wins over the GitHub one
        if let Some(client_id) = env_either("GUESTBOOK_OAUTH_CLIENT_ID", "GITHUB_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Some(secret) = env_either("GUESTBOOK_OAUTH_CLIENT_SECRET", "GITHUB_CLIENT_SECRET") {
            self.oauth.client_secret = secret;
        }
        if let Some(uri) = env_either("GUESTBOOK_OAUTH_REDIRECT_URI", "GITHUB_REDIRECT_URI") {
            self.oauth.redirect_uri = uri;
        }
        if let Ok(timeout) = std::env::var("GUESTBOOK_OAUTH_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.oauth.timeout_seconds = timeout;
            }
        }

        // Redirect destinations
        if let Ok(path) = std::env::var("GUESTBOOK_AUTH_SUCCESS_REDIRECT") {
            self.auth.success_redirect = path;
        }
        if let Ok(path) = std::env::var("GUESTBOOK_AUTH_FAILURE_REDIRECT") {
            self.auth.failure_redirect = path;
        }
    }
}

fn env_either(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
