//! Transport setup for stdio child processes and Streamable HTTP

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use mcpchat_core::{ClientError, ClientResult};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::ServiceExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::handler::{McpClient, McpClientHandler};

/// Spawn the endpoint process and complete the MCP handshake
pub(crate) async fn connect_stdio(
    endpoint: &str,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
    handler: McpClientHandler,
    timeout: Duration,
) -> ClientResult<McpClient> {
    info!(endpoint, command, "[Transport] Connecting to STDIO endpoint");

    let command_path = which::which(command)
        .or_else(|_| which::which(format!("{}.exe", command)))
        .map_err(|_| {
            let err = format!(
                "Command not found: {}. Ensure it's installed and in PATH.",
                command
            );
            error!(endpoint, "[Transport] {}", err);
            ClientError::Transport(err)
        })?;

    debug!(endpoint, path = ?command_path, "[Transport] Found command");

    let args = args.to_vec();
    let env = env.clone();
    let transport = TokioChildProcess::new(Command::new(&command_path).configure(move |cmd| {
        cmd.args(&args)
            .envs(&env)
            .stderr(Stdio::null())
            .kill_on_drop(true);
    }))
    .map_err(|e| ClientError::Transport(format!("Failed to spawn process: {}", e)))?;

    let client = handshake(endpoint, handler.serve(transport), timeout).await?;
    info!(endpoint, "[Transport] STDIO endpoint connected");
    Ok(client)
}

/// Connect to a Streamable HTTP endpoint with the configured headers
pub(crate) async fn connect_http(
    endpoint: &str,
    url: &str,
    headers: &HashMap<String, String>,
    handler: McpClientHandler,
    timeout: Duration,
) -> ClientResult<McpClient> {
    info!(endpoint, url, "[Transport] Connecting to HTTP endpoint");

    let client = reqwest::Client::builder()
        .default_headers(build_default_headers(headers)?)
        .build()
        .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

    let transport = StreamableHttpClientTransport::with_client(
        client,
        StreamableHttpClientTransportConfig::with_uri(url),
    );

    let client = handshake(endpoint, handler.serve(transport), timeout).await?;
    info!(endpoint, "[Transport] HTTP endpoint connected");
    Ok(client)
}

async fn handshake<F, E>(endpoint: &str, connect: F, timeout: Duration) -> ClientResult<McpClient>
where
    F: std::future::Future<Output = Result<McpClient, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => {
            let err = format!("{:#}", e);
            if requires_auth(&err) {
                info!(endpoint, "[Transport] Endpoint rejected the connection as unauthorized");
                Err(ClientError::AuthRequired)
            } else {
                error!(endpoint, error = %err, "[Transport] MCP handshake failed");
                Err(ClientError::Transport(format!("MCP handshake failed: {}", err)))
            }
        }
        Err(_) => {
            error!(endpoint, ?timeout, "[Transport] Connection timeout");
            Err(ClientError::Timeout(timeout))
        }
    }
}

/// Check whether a handshake error means the endpoint wants credentials
fn requires_auth(error_str: &str) -> bool {
    let error_lower = error_str.to_lowercase();
    let indicators = [
        "401",
        "unauthorized",
        "authrequired",
        "auth required",
        "invalid_token",
        "www-authenticate",
    ];
    indicators.iter().any(|s| error_lower.contains(s))
}

/// Build a reqwest HeaderMap from configured headers
pub(crate) fn build_default_headers(
    headers: &HashMap<String, String>,
) -> ClientResult<reqwest::header::HeaderMap> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            ClientError::Transport(format!("Invalid header name '{}': {}", key, e))
        })?;
        let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            ClientError::Transport(format!("Invalid header value for '{}': {}", key, e))
        })?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}
