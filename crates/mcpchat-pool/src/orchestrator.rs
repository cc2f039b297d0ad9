//! Connection orchestrator - the single facade over every endpoint
//!
//! Responsibilities:
//! - Own the endpoint name → [`ConnectionLifecycle`] map
//! - Fan out initialize/cleanup to every lifecycle
//! - Run the artifact refresh worker (periodic sweep + on-demand refresh)
//! - Expose read-only status, record and artifact accessors
//!
//! Retry and health logic live in the lifecycles; the orchestrator never
//! writes another component's state.
//!
//! ```text
//! StatusChanged(→Connected) ─┐
//! list_changed notification ─┼──► refresh channel ──┐
//!                            │                      ▼
//!              interval tick ┴──────────────► refresh worker
//!                                                   │ fetch (repository)
//!                                                   │ check_and_update (detector → cache)
//!                                                   └─► ArtifactsChanged
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use mcpchat_core::{
    normalize_endpoint_name, ArtifactCollection, ArtifactsChanged, ChatConfig, ConfigError,
    ConnectionRecord, ConnectionStatus, EndpointClientFactory, EndpointConfig, SharedEventBus,
    StatusChanged, SubscriptionId, TypedEvent,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artifacts::{ArtifactCache, ArtifactRepository, ChangeDetector, ChangeReport};
use crate::error::OrchestratorError;
use crate::lifecycle::ConnectionLifecycle;

/// Upper bound for shutting down one lifecycle during cleanup
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts of endpoints per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub total: usize,
    pub connected: usize,
    pub connecting: usize,
    pub reconnecting: usize,
    pub error: usize,
    pub disconnected: usize,
}

/// Outcome of [`ConnectionOrchestrator::cleanup`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Endpoints released cleanly
    pub released: Vec<String>,
    /// Endpoints whose release failed, with the reason
    pub failures: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// How a refresh decides whether to publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishPolicy {
    /// Only when the snapshot changed
    OnChange,
    /// Always, with the detected flag
    Always,
}

/// Background refresh worker and the handles that feed it
struct RefreshWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    subscription: SubscriptionId,
    trigger: mpsc::UnboundedSender<String>,
}

pub struct ConnectionOrchestrator {
    config: ChatConfig,
    factory: Arc<dyn EndpointClientFactory>,
    event_bus: SharedEventBus,
    /// Mutated only by initialize/add/remove/cleanup; never held across an await
    lifecycles: RwLock<HashMap<String, Arc<ConnectionLifecycle>>>,
    repository: ArtifactRepository,
    cache: Arc<ArtifactCache>,
    detector: ChangeDetector,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    worker: Mutex<Option<RefreshWorker>>,
    initialized: AtomicBool,
}

impl ConnectionOrchestrator {
    pub fn new(
        config: ChatConfig,
        factory: Arc<dyn EndpointClientFactory>,
        event_bus: SharedEventBus,
    ) -> Self {
        let cache = Arc::new(ArtifactCache::new());
        Self {
            repository: ArtifactRepository::from_settings(&config.settings),
            detector: ChangeDetector::new(cache.clone()),
            cache,
            config,
            factory,
            event_bus,
            lifecycles: RwLock::new(HashMap::new()),
            refresh_locks: DashMap::new(),
            worker: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Validate config, create one lifecycle per endpoint, start everything
    ///
    /// Configuration errors are returned before any background task starts.
    /// Endpoint connection failures are never returned; they surface as
    /// status and events.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), OrchestratorError> {
        if self.is_initialized() {
            return Err(OrchestratorError::AlreadyInitialized);
        }
        self.config.validate()?;
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(OrchestratorError::AlreadyInitialized);
        }

        info!(
            endpoints = self.config.endpoints.len(),
            "[Orchestrator] Initializing"
        );

        let trigger = self.start_refresh_worker();

        let created: Vec<Arc<ConnectionLifecycle>> = self
            .config
            .endpoints
            .iter()
            .map(|endpoint| self.create_lifecycle(endpoint.clone(), &trigger))
            .collect();
        {
            let mut map = self.lifecycles.write();
            for lifecycle in &created {
                map.insert(lifecycle.name().to_string(), lifecycle.clone());
            }
        }

        let results = join_all(created.iter().map(|l| l.connect())).await;
        for (lifecycle, result) in created.iter().zip(results) {
            if let Err(e) = result {
                warn!(
                    endpoint = %lifecycle.name(),
                    error = %e,
                    "[Orchestrator] Failed to start lifecycle"
                );
            }
        }

        info!("[Orchestrator] Initialized");
        Ok(())
    }

    /// Stop every background task and release every endpoint
    ///
    /// Attempts every release even if some fail, and reports each failure.
    pub async fn cleanup(&self) -> CleanupReport {
        info!("[Orchestrator] Cleaning up");

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            self.event_bus.unsubscribe(worker.subscription);
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                error!(error = %e, "[Orchestrator] Refresh worker failed");
            }
        }

        let lifecycles: Vec<Arc<ConnectionLifecycle>> =
            self.lifecycles.write().drain().map(|(_, l)| l).collect();

        let outcomes = join_all(lifecycles.iter().map(|lifecycle| async move {
            let result = match tokio::time::timeout(SHUTDOWN_TIMEOUT, lifecycle.shutdown()).await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("shutdown timed out after {:?}", SHUTDOWN_TIMEOUT)),
            };
            (lifecycle.name().to_string(), result)
        }))
        .await;

        let mut report = CleanupReport::default();
        for (name, result) in outcomes {
            match result {
                Ok(()) => report.released.push(name),
                Err(reason) => {
                    error!(endpoint = %name, error = %reason, "[Orchestrator] Failed to release endpoint");
                    report.failures.push((name, reason));
                }
            }
        }
        report.released.sort();

        self.cache.clear();
        self.refresh_locks.clear();
        self.initialized.store(false, Ordering::Release);

        info!(
            released = report.released.len(),
            failed = report.failures.len(),
            "[Orchestrator] Cleanup complete"
        );
        report
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    pub fn status(&self, endpoint: &str) -> Option<ConnectionStatus> {
        self.lifecycles.read().get(endpoint).map(|l| l.status())
    }

    pub fn record(&self, endpoint: &str) -> Option<ConnectionRecord> {
        self.lifecycles.read().get(endpoint).map(|l| l.record())
    }

    /// Names of connected endpoints, sorted
    pub fn connected_endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lifecycles
            .read()
            .values()
            .filter(|l| l.status().is_connected())
            .map(|l| l.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Names of all managed endpoints, sorted
    pub fn endpoint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lifecycles.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Last known artifacts (a copy)
    pub fn artifacts_for(&self, endpoint: &str) -> Option<ArtifactCollection> {
        self.cache.get(endpoint)
    }

    /// Subscribe to one event type on the shared bus
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: TypedEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.event_bus.subscribe::<E, F>(handler)
    }

    pub fn stats(&self) -> OrchestratorStats {
        let lifecycles = self.lifecycles.read();
        let mut stats = OrchestratorStats {
            total: lifecycles.len(),
            ..Default::default()
        };
        for lifecycle in lifecycles.values() {
            match lifecycle.status() {
                ConnectionStatus::Connected => stats.connected += 1,
                ConnectionStatus::Connecting => stats.connecting += 1,
                ConnectionStatus::Reconnecting => stats.reconnecting += 1,
                ConnectionStatus::Error => stats.error += 1,
                ConnectionStatus::Disconnected => stats.disconnected += 1,
            }
        }
        stats
    }

    // ========================================================================
    // Manual operations
    // ========================================================================

    /// Restart an endpoint's connection with a fresh retry budget
    pub async fn reconnect(&self, endpoint: &str) -> Result<(), OrchestratorError> {
        let lifecycle = self.lifecycle(endpoint)?;
        info!(endpoint, "[Orchestrator] Manual reconnect requested");
        lifecycle.reconnect().await?;
        Ok(())
    }

    /// Refresh one endpoint now and always publish the result
    ///
    /// Returns `None` if the endpoint is not connected or a refresh of it is
    /// already running.
    pub async fn refresh_now(
        &self,
        endpoint: &str,
    ) -> Result<Option<ChangeReport>, OrchestratorError> {
        self.lifecycle(endpoint)?;
        Ok(self.refresh_endpoint(endpoint, PublishPolicy::Always).await)
    }

    /// Add and start an endpoint at runtime
    pub async fn add_endpoint(&self, endpoint: EndpointConfig) -> Result<(), OrchestratorError> {
        endpoint.validate()?;
        let trigger = self
            .worker
            .lock()
            .as_ref()
            .map(|w| w.trigger.clone())
            .ok_or(OrchestratorError::NotInitialized)?;

        let lifecycle = self.create_lifecycle(endpoint, &trigger);
        {
            let mut map = self.lifecycles.write();
            let normalized = normalize_endpoint_name(lifecycle.name());
            let taken: HashSet<String> = map.keys().map(|k| normalize_endpoint_name(k)).collect();
            if taken.contains(&normalized) {
                return Err(ConfigError::DuplicateEndpoint(lifecycle.name().to_string()).into());
            }
            map.insert(lifecycle.name().to_string(), lifecycle.clone());
        }

        info!(endpoint = %lifecycle.name(), "[Orchestrator] Endpoint added");
        lifecycle.connect().await?;
        Ok(())
    }

    /// Stop and forget an endpoint; its cached artifacts are discarded
    pub async fn remove_endpoint(&self, endpoint: &str) -> Result<(), OrchestratorError> {
        let lifecycle = self
            .lifecycles
            .write()
            .remove(endpoint)
            .ok_or_else(|| OrchestratorError::UnknownEndpoint(endpoint.to_string()))?;

        lifecycle.disconnect().await;
        self.cache.remove(endpoint);
        self.refresh_locks.remove(endpoint);
        info!(endpoint, "[Orchestrator] Endpoint removed");
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lifecycle(&self, endpoint: &str) -> Result<Arc<ConnectionLifecycle>, OrchestratorError> {
        self.lifecycles
            .read()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownEndpoint(endpoint.to_string()))
    }

    fn create_lifecycle(
        &self,
        endpoint: EndpointConfig,
        trigger: &mpsc::UnboundedSender<String>,
    ) -> Arc<ConnectionLifecycle> {
        let client = self.factory.create(&endpoint);

        let name = endpoint.name.clone();
        let trigger = trigger.clone();
        client.set_list_changed_listener(Arc::new(move || {
            let _ = trigger.send(name.clone());
        }));

        Arc::new(ConnectionLifecycle::new(
            endpoint,
            client,
            &self.config.settings,
            self.event_bus.clone(),
        ))
    }

    /// Subscribe to connect events and spawn the refresh loop
    fn start_refresh_worker(self: &Arc<Self>) -> mpsc::UnboundedSender<String> {
        let (trigger, mut requests) = mpsc::unbounded_channel::<String>();

        // Handlers run on the publisher's thread; hand off to the worker
        let on_connect = trigger.clone();
        let subscription = self.event_bus.subscribe::<StatusChanged, _>(move |event| {
            if event.new == ConnectionStatus::Connected {
                let _ = on_connect.send(event.endpoint.clone());
            }
        });

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.settings.artifact_refresh_interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(this) = weak.upgrade() else { break };
                        tokio::select! {
                            _ = task_cancel.cancelled() => break,
                            _ = this.refresh_sweep() => {}
                        }
                    }
                    Some(endpoint) = requests.recv() => {
                        let Some(this) = weak.upgrade() else { break };
                        tokio::select! {
                            _ = task_cancel.cancelled() => break,
                            _ = this.refresh_endpoint(&endpoint, PublishPolicy::OnChange) => {}
                        }
                    }
                }
            }
            debug!("[Orchestrator] Refresh worker stopped");
        });

        *self.worker.lock() = Some(RefreshWorker {
            cancel,
            handle,
            subscription,
            trigger: trigger.clone(),
        });
        trigger
    }

    /// Refresh every connected endpoint concurrently
    async fn refresh_sweep(&self) {
        let connected = self.connected_endpoints();
        if connected.is_empty() {
            return;
        }
        debug!(
            count = connected.len(),
            "[Orchestrator] Periodic refresh starting"
        );
        join_all(
            connected
                .iter()
                .map(|name| self.refresh_endpoint(name, PublishPolicy::OnChange)),
        )
        .await;
    }

    /// Fetch, compare, cache, publish
    async fn refresh_endpoint(&self, endpoint: &str, policy: PublishPolicy) -> Option<ChangeReport> {
        let lifecycle = self.lifecycles.read().get(endpoint).cloned()?;
        if !lifecycle.status().is_connected() {
            debug!(endpoint, "[Orchestrator] Skipping refresh, endpoint not connected");
            return None;
        }

        let lock = self
            .refresh_locks
            .entry(endpoint.to_string())
            .or_default()
            .clone();
        let Ok(_guard) = lock.try_lock_owned() else {
            debug!(endpoint, "[Orchestrator] Refresh already in progress, skipping");
            return None;
        };

        let client = lifecycle.client();
        let collection = self.repository.fetch(endpoint, client.as_ref()).await;

        // Results from a connection that dropped mid-fetch are not trusted
        if !lifecycle.status().is_connected() || self.status(endpoint).is_none() {
            debug!(endpoint, "[Orchestrator] Endpoint went away during refresh, discarding");
            return None;
        }

        let report = self.detector.check_and_update(endpoint, &collection);
        if report.changed {
            info!(
                endpoint,
                added = report.diff.added.len(),
                removed = report.diff.removed.len(),
                modified = report.diff.modified.len(),
                "[Orchestrator] Artifacts changed"
            );
        }

        if report.changed || policy == PublishPolicy::Always {
            self.event_bus.publish(
                ArtifactsChanged {
                    endpoint: endpoint.to_string(),
                    collection,
                    changed: report.changed,
                    diff: report.diff.clone(),
                }
                .into(),
            );
        }
        Some(report)
    }
}
