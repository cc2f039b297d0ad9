//! Error types shared across mcpchat crates

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or unreadable configuration
///
/// These are contract errors: they are raised before any background task
/// starts and are the only errors allowed to abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("duplicate endpoint name '{0}'")]
    DuplicateEndpoint(String),

    #[error("endpoint '{endpoint}' has an invalid transport: {reason}")]
    InvalidTransport { endpoint: String, reason: String },

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure reported by an endpoint client operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("endpoint is not connected")]
    NotConnected,

    #[error("endpoint requires authentication")]
    AuthRequired,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
