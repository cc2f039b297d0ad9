//! Connection status and the per-endpoint connection record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Endpoint connection status
///
/// Runtime state only, never persisted. Exactly one value per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected (idle state) - this is the default
    #[default]
    Disconnected,
    /// Transport connect in flight
    Connecting,
    /// Transport is live and answering probes
    Connected,
    /// Waiting out a reconnect delay
    Reconnecting,
    /// Automatic retries exhausted; waits for a manual reconnect
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// Check if the endpoint is currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a manual `connect()` may start a new maintenance loop
    pub fn accepts_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Compact encoding for lock-free storage
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Reconnecting => 3,
            Self::Error => 4,
        }
    }

    /// Inverse of [`ConnectionStatus::as_u8`]; unknown values decode as `Disconnected`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one endpoint's connection state
///
/// The owning lifecycle is the only writer; everyone else gets snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRecord {
    pub endpoint: String,
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    /// Failed attempts since the last successful connect
    pub reconnect_attempt: u32,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Successful connects over the lifetime of the record
    pub connect_count: u64,
}

impl ConnectionRecord {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            status: ConnectionStatus::Disconnected,
            last_error: None,
            reconnect_attempt: 0,
            last_connected_at: None,
            last_attempt_at: None,
            connect_count: 0,
        }
    }
}
