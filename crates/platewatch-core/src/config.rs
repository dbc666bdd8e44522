//! Configuration management for PlateWatch
//!
//! Values are layered: built-in defaults, then an optional file, then
//! `PLATEWATCH__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::default_group_names;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PLATEWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API configuration
    pub server: ServerConfig,

    /// Sensor source configuration
    pub source: SourceConfig,

    /// Alert engine configuration
    pub engine: EngineConfig,

    /// State file configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(std::path::Path::new(path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.poll_interval.is_zero() {
            return Err(Error::config("engine.poll_interval must be greater than zero"));
        }
        if self.engine.dedup_window.is_zero() {
            return Err(Error::config("engine.dedup_window must be greater than zero"));
        }
        if self.engine.max_notifications == 0 {
            return Err(Error::config("engine.max_notifications must be greater than zero"));
        }
        if self.source.timeout.is_zero() {
            return Err(Error::config("source.timeout must be greater than zero"));
        }
        url::Url::parse(&self.source.url)
            .map_err(|e| Error::config(format!("source.url '{}': {e}", self.source.url)))?;
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(Error::config(format!(
                "logging.format must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }

    /// Address the HTTP API binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Sensor source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint returning the latest sensor sample
    pub url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000/api/metrics/realtime".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// Alert engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time between polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// A group is not notified again while its last notification is younger than this
    #[serde(with = "humantime_serde")]
    pub dedup_window: Duration,
    /// Oldest notifications are dropped beyond this count
    pub max_notifications: usize,
    /// Display names keyed by group id
    pub group_names: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            dedup_window: Duration::from_secs(60),
            max_notifications: 200,
            group_names: default_group_names(),
        }
    }
}

/// State file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where rules and notifications are saved between runs
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = directories::ProjectDirs::from("io", "platewatch", "platewatch")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            state_file: dir.join("state.json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
