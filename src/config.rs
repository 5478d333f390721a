//! Configuration management for storefront-auth.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::exchange::{
    AccountClient, CredentialExchange, DemoExchange, ExchangeError, HttpExchange,
};
use crate::session::{SessionContainer, DEFAULT_STORAGE_KEY};
use crate::storage::FileStorage;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential exchange configuration.
    pub exchange: ExchangeSection,
    /// Session storage configuration.
    pub storage: StorageSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Which credential exchange to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    /// POST to the configured endpoint.
    #[default]
    Http,
    /// Accept any credentials as the demo admin.
    Demo,
}

impl std::str::FromStr for ExchangeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "demo" => Ok(Self::Demo),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Credential exchange section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSection {
    /// Exchange implementation.
    pub mode: ExchangeMode,
    /// Authentication endpoint URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            mode: ExchangeMode::Http,
            endpoint: "http://127.0.0.1:3000/api/auth".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Session storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding the session file. Defaults to the platform data
    /// directory.
    pub dir: Option<PathBuf>,
    /// Key the session is stored under.
    pub key: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            dir: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(mode) = std::env::var("STOREFRONT_AUTH_MODE") {
            self.exchange.mode = mode.parse()?;
        }

        if let Ok(endpoint) = std::env::var("STOREFRONT_AUTH_ENDPOINT") {
            if !endpoint.is_empty() {
                self.exchange.endpoint = endpoint;
            }
        }

        if let Ok(dir) = std::env::var("STOREFRONT_AUTH_STORAGE_DIR") {
            if !dir.is_empty() {
                self.storage.dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(level) = std::env::var("STOREFRONT_AUTH_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.exchange.endpoint = endpoint.clone();
        }

        if args.demo {
            self.exchange.mode = ExchangeMode::Demo;
        }

        if let Some(ref dir) = args.storage_dir {
            self.storage.dir = Some(dir.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Directory the session file lives in.
    pub fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.storage.dir {
            Some(ref dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("storefront-auth"))
                .ok_or(ConfigError::NoStorageDir),
        }
    }

    /// Build the configured credential exchange.
    pub fn build_exchange(&self) -> Result<Arc<dyn CredentialExchange>, ConfigError> {
        match self.exchange.mode {
            ExchangeMode::Demo => Ok(Arc::new(DemoExchange::new())),
            ExchangeMode::Http => {
                if self.exchange.endpoint.is_empty() {
                    return Err(ConfigError::MissingEndpoint);
                }
                let exchange = HttpExchange::with_timeout(
                    self.exchange.endpoint.clone(),
                    Duration::from_secs(self.exchange.timeout_secs),
                )
                .map_err(ConfigError::Exchange)?;
                Ok(Arc::new(exchange))
            }
        }
    }

    /// Build the client for the account endpoints, which live on the same
    /// origin as the authentication endpoint.
    pub fn build_account(&self) -> Result<AccountClient, ConfigError> {
        if self.exchange.mode == ExchangeMode::Demo {
            return Err(ConfigError::NoBackend);
        }
        if self.exchange.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        AccountClient::with_timeout(
            &self.exchange.endpoint,
            Duration::from_secs(self.exchange.timeout_secs),
        )
        .map_err(ConfigError::Exchange)
    }

    /// Build a session container over file storage, restoring any
    /// persisted session.
    pub fn build_container(&self) -> Result<SessionContainer, ConfigError> {
        let storage = FileStorage::new(self.storage_dir()?);
        storage
            .path_for(&self.storage.key)
            .map_err(|_| ConfigError::InvalidKey(self.storage.key.clone()))?;

        let exchange = self.build_exchange()?;
        let storage = Arc::new(storage);
        Ok(SessionContainer::with_key(
            exchange,
            storage,
            self.storage.key.clone(),
        ))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unknown exchange mode.
    InvalidMode(String),
    /// HTTP mode without an endpoint.
    MissingEndpoint,
    /// No storage directory configured and no platform default.
    NoStorageDir,
    /// Storage key cannot be used as a file name.
    InvalidKey(String),
    /// Backend client could not be constructed.
    Exchange(ExchangeError),
    /// Demo mode has no backend for account operations.
    NoBackend,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidMode(mode) => {
                write!(f, "invalid exchange mode: '{}' (expected http or demo)", mode)
            }
            Self::MissingEndpoint => write!(f, "http exchange requires an endpoint"),
            Self::NoStorageDir => write!(f, "no storage directory; set storage.dir"),
            Self::InvalidKey(key) => write!(
                f,
                "invalid storage key: '{}' (use letters, digits, '-', '_' or '.')",
                key
            ),
            Self::Exchange(e) => write!(f, "failed to set up backend client: {}", e),
            Self::NoBackend => write!(f, "account commands need the http exchange, not demo"),
        }
    }
}

impl std::error::Error for ConfigError {}
