//! # mcpchat Connection Pool
//!
//! Keeps every configured endpoint connected and its artifacts in sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   ConnectionOrchestrator                     │
//! │  name → ConnectionLifecycle          refresh worker          │
//! │          ├─ ReconnectionStrategy      ├─ ArtifactRepository  │
//! │          └─ HealthChecker             ├─ ChangeDetector      │
//! │                                       └─ ArtifactCache       │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ StatusChanged / ReconnectProgress /
//!                                ▼ ArtifactsChanged
//!                            EventBus
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let bus = create_shared_event_bus();
//! let orchestrator = Arc::new(ConnectionOrchestrator::new(config, factory, bus));
//! orchestrator.subscribe::<StatusChanged, _>(|e| println!("{} → {}", e.endpoint, e.new));
//! orchestrator.initialize().await?;
//! // ...
//! let report = orchestrator.cleanup().await;
//! ```

pub mod artifacts;
mod error;
mod health;
mod lifecycle;
mod orchestrator;
mod reconnect;

pub use artifacts::{ArtifactCache, ArtifactRepository, ChangeDetector, ChangeReport};
pub use error::{LifecycleError, OrchestratorError};
pub use health::{HealthChecker, HealthMonitor};
pub use lifecycle::ConnectionLifecycle;
pub use orchestrator::{CleanupReport, ConnectionOrchestrator, OrchestratorStats};
pub use reconnect::{ReconnectDecision, ReconnectionStrategy};
