//! rmcp client handler
//!
//! Identifies mcpchat during the handshake and forwards list-changed
//! notifications to whatever listener the endpoint client has registered.

use std::sync::Arc;

use mcpchat_core::ListChangedListener;
use parking_lot::RwLock;
use rmcp::model::{ClientInfo, Implementation};
use rmcp::service::{NotificationContext, RunningService};
use rmcp::RoleClient;
use tracing::{debug, info};

/// Type alias for the MCP client service
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Listener slot shared between the endpoint client and its handlers
pub(crate) type ListenerSlot = Arc<RwLock<Option<ListChangedListener>>>;

/// Client handler for MCP connections
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
    endpoint: String,
    listener: ListenerSlot,
}

impl std::fmt::Debug for McpClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientHandler")
            .field("endpoint", &self.endpoint)
            .field("listener", &self.listener.read().is_some())
            .finish()
    }
}

impl McpClientHandler {
    pub(crate) fn new(endpoint: &str, listener: ListenerSlot) -> Self {
        let mut client_info = Implementation::default();
        client_info.name = format!("mcpchat-{}", endpoint);
        client_info.version = env!("CARGO_PKG_VERSION").to_string();

        let mut info = ClientInfo::default();
        info.client_info = client_info;

        Self {
            info,
            endpoint: endpoint.to_string(),
            listener,
        }
    }

    fn notify(&self, list: &'static str) {
        info!(
            endpoint = %self.endpoint,
            list,
            "[McpClientHandler] Endpoint sent list_changed notification"
        );
        match self.listener.read().clone() {
            Some(listener) => listener(),
            None => debug!(
                endpoint = %self.endpoint,
                "[McpClientHandler] No listener registered, notification dropped"
            ),
        }
    }
}

impl rmcp::ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        self.notify("tools");
        std::future::ready(())
    }

    fn on_prompt_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        self.notify("prompts");
        std::future::ready(())
    }

    fn on_resource_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        self.notify("resources");
        std::future::ready(())
    }
}
