//! # mcpchat MCP Library
//!
//! Implements the `EndpointClient` contract on top of the rmcp SDK.
//!
//! ```text
//! RmcpEndpointClient ──connect──► StdioTransport (child process, kill_on_drop)
//!                               └► Streamable HTTP (reqwest, configured headers)
//!        │
//!        └─ McpClientHandler ── list_changed ──► registered listener
//! ```

mod client;
mod conversion;
mod handler;
mod transport;

pub use client::{RmcpClientFactory, RmcpEndpointClient};
pub use conversion::{prompt_to_artifact, resource_to_artifact, tool_to_artifact};
pub use handler::{McpClient, McpClientHandler};
