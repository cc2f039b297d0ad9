//! Endpoint client contract
//!
//! The connection core never talks to a transport directly. It drives an
//! [`EndpointClient`] per endpoint; the rmcp-backed implementation lives in
//! `mcpchat-mcp`, tests use scripted mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{EndpointConfig, PromptArtifact, ResourceArtifact, ToolArtifact};
use crate::error::ClientResult;

/// Callback fired when the endpoint announces that a list changed
pub type ListChangedListener = Arc<dyn Fn() + Send + Sync>;

/// Protocol client for one endpoint
///
/// Every call carries an explicit timeout; implementations must return
/// [`ClientError::Timeout`](crate::ClientError::Timeout) rather than wait longer.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Establish the transport and complete the protocol handshake
    async fn connect(&self, timeout: Duration) -> ClientResult<()>;

    /// Release the transport. Must be safe to call when not connected.
    async fn disconnect(&self);

    /// Cheapest round-trip that proves the connection is alive
    async fn probe(&self, timeout: Duration) -> ClientResult<()>;

    async fn list_tools(&self, timeout: Duration) -> ClientResult<Vec<ToolArtifact>>;

    async fn list_resources(&self, timeout: Duration) -> ClientResult<Vec<ResourceArtifact>>;

    async fn list_prompts(&self, timeout: Duration) -> ClientResult<Vec<PromptArtifact>>;

    /// Resolves once the live transport has gone away on its own
    ///
    /// Lets the owner react to a dropped session without waiting for the
    /// next health check. Resolves immediately when there is no session.
    /// The default never resolves, leaving detection to health checks.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }

    /// Register a listener for list-changed notifications
    ///
    /// Clients whose transport cannot deliver notifications ignore it.
    fn set_list_changed_listener(&self, _listener: ListChangedListener) {}
}

/// Creates one client per configured endpoint
pub trait EndpointClientFactory: Send + Sync {
    fn create(&self, config: &EndpointConfig) -> Arc<dyn EndpointClient>;
}
