//! Pool error types

use mcpchat_core::{ConfigError, ConnectionStatus};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// `connect()` is only valid from `Disconnected` or `Error` with no loop running
    #[error("cannot connect '{endpoint}' while {status}")]
    InvalidState {
        endpoint: String,
        status: ConnectionStatus,
    },

    /// The transport stalled or panicked while being released
    #[error("failed to release '{endpoint}': {reason}")]
    ReleaseFailed { endpoint: String, reason: String },

    #[error("maintenance task for '{endpoint}' failed: {reason}")]
    TaskFailed { endpoint: String, reason: String },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("orchestrator is already initialized")]
    AlreadyInitialized,

    #[error("orchestrator is not initialized")]
    NotInitialized,

    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
