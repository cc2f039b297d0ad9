//! rmcp-backed [`EndpointClient`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpchat_core::{
    ClientError, ClientResult, EndpointClient, EndpointClientFactory, EndpointConfig,
    ListChangedListener, PromptArtifact, ResourceArtifact, ToolArtifact, TransportSpec,
};
use rmcp::service::{Peer, ServiceError};
use rmcp::RoleClient;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conversion::{prompt_to_artifact, resource_to_artifact, tool_to_artifact};
use crate::handler::{ListenerSlot, McpClient, McpClientHandler};
use crate::transport::{connect_http, connect_stdio};

/// How often [`RmcpEndpointClient::closed`] looks at the session
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Protocol client for one configured endpoint
///
/// Holds at most one live rmcp session. List calls clone the session's peer
/// under a short lock so they never block `disconnect`.
pub struct RmcpEndpointClient {
    config: EndpointConfig,
    session: Mutex<Option<McpClient>>,
    listener: ListenerSlot,
}

impl RmcpEndpointClient {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            listener: Default::default(),
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    async fn peer(&self) -> ClientResult<Peer<RoleClient>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|client| client.peer().clone())
            .ok_or(ClientError::NotConnected)
    }

    /// Auth-flagged HTTP endpoints need an `Authorization` header up front
    fn has_credentials(&self) -> bool {
        match &self.config.transport {
            TransportSpec::Http { headers, .. } => headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case("authorization")),
            TransportSpec::Stdio { .. } => true,
        }
    }
}

fn map_service_error(error: ServiceError) -> ClientError {
    match error {
        ServiceError::McpError(e) => ClientError::Protocol(e.message.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

async fn with_timeout<T, F>(timeout: Duration, call: F) -> ClientResult<T>
where
    F: std::future::Future<Output = Result<T, ServiceError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ClientError::Timeout(timeout))?
        .map_err(map_service_error)
}

#[async_trait]
impl EndpointClient for RmcpEndpointClient {
    async fn connect(&self, timeout: Duration) -> ClientResult<()> {
        if self.config.requires_auth && !self.has_credentials() {
            warn!(
                endpoint = %self.config.name,
                "[RmcpClient] Endpoint requires authentication but no Authorization header is configured"
            );
            return Err(ClientError::AuthRequired);
        }

        // Release any stale session before opening a new one
        self.disconnect().await;

        let handler = McpClientHandler::new(&self.config.name, self.listener.clone());
        let client = match &self.config.transport {
            TransportSpec::Stdio { command, args, env } => {
                connect_stdio(&self.config.name, command, args, env, handler, timeout).await?
            }
            TransportSpec::Http { url, headers } => {
                connect_http(&self.config.name, url, headers, handler, timeout).await?
            }
        };

        *self.session.lock().await = Some(client);
        Ok(())
    }

    async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(client) = session {
            match client.cancel().await {
                Ok(reason) => debug!(
                    endpoint = %self.config.name,
                    ?reason,
                    "[RmcpClient] Session closed"
                ),
                Err(e) => warn!(
                    endpoint = %self.config.name,
                    error = %e,
                    "[RmcpClient] Session task failed while closing"
                ),
            }
            info!(endpoint = %self.config.name, "[RmcpClient] Disconnected");
        }
    }

    async fn probe(&self, timeout: Duration) -> ClientResult<()> {
        let peer = self.peer().await?;
        with_timeout(timeout, peer.list_tools(Default::default())).await?;
        Ok(())
    }

    async fn list_tools(&self, timeout: Duration) -> ClientResult<Vec<ToolArtifact>> {
        let peer = self.peer().await?;
        let tools = with_timeout(timeout, peer.list_all_tools()).await?;
        Ok(tools.iter().map(tool_to_artifact).collect())
    }

    async fn list_resources(&self, timeout: Duration) -> ClientResult<Vec<ResourceArtifact>> {
        let peer = self.peer().await?;
        let resources = with_timeout(timeout, peer.list_all_resources()).await?;
        Ok(resources.iter().map(resource_to_artifact).collect())
    }

    async fn list_prompts(&self, timeout: Duration) -> ClientResult<Vec<PromptArtifact>> {
        let peer = self.peer().await?;
        let prompts = with_timeout(timeout, peer.list_all_prompts()).await?;
        Ok(prompts.iter().map(prompt_to_artifact).collect())
    }

    async fn closed(&self) {
        // The peer's sender closes when the session's service loop exits
        let Ok(peer) = self.peer().await else {
            return;
        };
        let mut ticker = tokio::time::interval(CLOSE_POLL_INTERVAL);
        while !peer.is_transport_closed() {
            ticker.tick().await;
        }
        warn!(endpoint = %self.config.name, "[RmcpClient] Session transport closed");
    }

    fn set_list_changed_listener(&self, listener: ListChangedListener) {
        *self.listener.write() = Some(listener);
    }
}

/// Creates an [`RmcpEndpointClient`] per endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpClientFactory;

impl RmcpClientFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointClientFactory for RmcpClientFactory {
    fn create(&self, config: &EndpointConfig) -> Arc<dyn EndpointClient> {
        Arc::new(RmcpEndpointClient::new(config.clone()))
    }
}
