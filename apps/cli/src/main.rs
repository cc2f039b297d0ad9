//! mcpchat - connects to every configured MCP endpoint, keeps the connections
//! alive and the artifact catalog in sync until Ctrl-C.
//!
//! Usage: `mcpchat [CONFIG]`
//!
//! Config path resolution: CLI argument, then `MCPCHAT_CONFIG`, then
//! `<config dir>/mcpchat/config.json`.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mcpchat_core::{
    create_shared_event_bus, ArtifactsChanged, ChatConfig, ReconnectProgress, StatusChanged,
};
use mcpchat_mcp::RmcpClientFactory;
use mcpchat_pool::ConnectionOrchestrator;
use tracing::{error, info, warn};

fn config_path() -> Result<PathBuf> {
    if let Some(arg) = std::env::args_os().nth(1) {
        return Ok(PathBuf::from(arg));
    }
    if let Some(path) = std::env::var_os("MCPCHAT_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("mcpchat").join("config.json"))
        .context("no config path given and no platform config directory available")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    let _guard = logging::init_tracing()?;

    let path = config_path()?;
    info!(path = %path.display(), "[mcpchat] Loading config");
    let config = ChatConfig::load(&path)
        .with_context(|| format!("invalid config at {}", path.display()))?;

    let event_bus = create_shared_event_bus();
    let orchestrator = Arc::new(ConnectionOrchestrator::new(
        config,
        Arc::new(RmcpClientFactory::new()),
        event_bus,
    ));

    orchestrator.subscribe::<StatusChanged, _>(|e| match &e.message {
        Some(message) => warn!(
            endpoint = %e.endpoint,
            from = %e.old,
            to = %e.new,
            reason = %message,
            "[mcpchat] Status changed"
        ),
        None => info!(endpoint = %e.endpoint, from = %e.old, to = %e.new, "[mcpchat] Status changed"),
    });
    orchestrator.subscribe::<ReconnectProgress, _>(|e| {
        info!(
            endpoint = %e.endpoint,
            attempt = e.attempt,
            max_attempts = %e.max_attempts,
            delay_ms = e.next_delay.as_millis() as u64,
            "[mcpchat] Reconnect scheduled"
        );
    });

    let summary = Arc::downgrade(&orchestrator);
    orchestrator.subscribe::<ArtifactsChanged, _>(move |e| {
        println!(
            "{}: {} tools, {} resources, {} prompts (+{} -{} ~{})",
            e.endpoint,
            e.collection.tools.len(),
            e.collection.resources.len(),
            e.collection.prompts.len(),
            e.diff.added.len(),
            e.diff.removed.len(),
            e.diff.modified.len(),
        );
        if let Some(orchestrator) = summary.upgrade() {
            let stats = orchestrator.stats();
            println!(
                "endpoints: {} total, {} connected, {} reconnecting, {} error",
                stats.total, stats.connected, stats.reconnecting, stats.error
            );
        }
    });

    orchestrator
        .initialize()
        .await
        .context("failed to initialize endpoints")?;

    info!("[mcpchat] Running, press Ctrl-C to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "[mcpchat] Failed to listen for Ctrl-C, shutting down");
    }

    let report = orchestrator.cleanup().await;
    if report.is_clean() {
        info!(released = report.released.len(), "[mcpchat] Shutdown complete");
    } else {
        for (endpoint, reason) in &report.failures {
            error!(endpoint = %endpoint, reason = %reason, "[mcpchat] Endpoint did not release cleanly");
        }
    }

    Ok(())
}
