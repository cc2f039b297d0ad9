//! Client events
//!
//! Every observable change in the connection core is one of three facts:
//! a status transition, a scheduled reconnect, or a refreshed artifact
//! snapshot. Each fact is its own struct so subscribers can register for one
//! kind and receive it fully typed (see [`TypedEvent`]).

use std::time::Duration;

use serde::Serialize;

use super::{ArtifactCollection, ArtifactDiff, ConnectionStatus, MaxAttempts};

/// Discriminant used to route events to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChanged,
    ReconnectProgress,
    ArtifactsChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChanged => "status_changed",
            Self::ReconnectProgress => "reconnect_progress",
            Self::ArtifactsChanged => "artifacts_changed",
        }
    }
}

/// An endpoint moved from one status to another (`old != new`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChanged {
    pub endpoint: String,
    pub old: ConnectionStatus,
    pub new: ConnectionStatus,
    /// Error text for transitions caused by a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A reconnect has been scheduled; published before the delay is awaited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectProgress {
    pub endpoint: String,
    /// Failed attempts so far (1-based)
    pub attempt: u32,
    pub max_attempts: MaxAttempts,
    pub next_delay: Duration,
}

/// Result of an artifact refresh for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactsChanged {
    pub endpoint: String,
    pub collection: ArtifactCollection,
    /// Whether the snapshot differs from the previously cached one
    pub changed: bool,
    pub diff: ArtifactDiff,
}

/// Tagged union of all client events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    StatusChanged(StatusChanged),
    ReconnectProgress(ReconnectProgress),
    ArtifactsChanged(ArtifactsChanged),
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusChanged(_) => EventKind::StatusChanged,
            Self::ReconnectProgress(_) => EventKind::ReconnectProgress,
            Self::ArtifactsChanged(_) => EventKind::ArtifactsChanged,
        }
    }

    /// Get the event type name for logging
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Endpoint the event is about
    pub fn endpoint(&self) -> &str {
        match self {
            Self::StatusChanged(e) => &e.endpoint,
            Self::ReconnectProgress(e) => &e.endpoint,
            Self::ArtifactsChanged(e) => &e.endpoint,
        }
    }
}

impl From<StatusChanged> for ClientEvent {
    fn from(event: StatusChanged) -> Self {
        Self::StatusChanged(event)
    }
}

impl From<ReconnectProgress> for ClientEvent {
    fn from(event: ReconnectProgress) -> Self {
        Self::ReconnectProgress(event)
    }
}

impl From<ArtifactsChanged> for ClientEvent {
    fn from(event: ArtifactsChanged) -> Self {
        Self::ArtifactsChanged(event)
    }
}

/// A concrete event payload that can be subscribed to by type
pub trait TypedEvent: Send + Sync + 'static {
    const KIND: EventKind;

    /// Borrow the payload if `event` is of this type
    fn from_event(event: &ClientEvent) -> Option<&Self>;
}

impl TypedEvent for StatusChanged {
    const KIND: EventKind = EventKind::StatusChanged;

    fn from_event(event: &ClientEvent) -> Option<&Self> {
        match event {
            ClientEvent::StatusChanged(e) => Some(e),
            _ => None,
        }
    }
}

impl TypedEvent for ReconnectProgress {
    const KIND: EventKind = EventKind::ReconnectProgress;

    fn from_event(event: &ClientEvent) -> Option<&Self> {
        match event {
            ClientEvent::ReconnectProgress(e) => Some(e),
            _ => None,
        }
    }
}

impl TypedEvent for ArtifactsChanged {
    const KIND: EventKind = EventKind::ArtifactsChanged;

    fn from_event(event: &ClientEvent) -> Option<&Self> {
        match event {
            ClientEvent::ArtifactsChanged(e) => Some(e),
            _ => None,
        }
    }
}
