//! Error types for PlateWatch

use thiserror::Error;

/// Result type alias using PlateWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PlateWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error while polling the sensor source
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The sensor source did not answer within the configured timeout
    #[error("Sensor source timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The sensor source answered without a usable sample
    #[error("Sensor source returned no sample")]
    EmptyPayload,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Conflicting identifier
    #[error("{entity} already exists: {id}")]
    Conflict { entity: String, id: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a transient sensor source failure.
    ///
    /// Transient failures flip the engine's connectivity flag and are retried
    /// on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_) | Self::EmptyPayload)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
