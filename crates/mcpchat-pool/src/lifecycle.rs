//! Connection lifecycle - per-endpoint state machine
//!
//! ```text
//!                connect()
//! Disconnected ───────────► Connecting ──ok──► Connected
//!      ▲                      ▲    │               │ probe failed / transport closed
//!      │ disconnect()         │    │ failed        ▼
//!      │                      └─── Reconnecting ◄──┘
//!      │                                │ attempts exhausted
//!      └──────────────────────────── Error ◄┘  (manual connect() allowed)
//! ```
//!
//! Only the lifecycle's own maintenance task writes status while it runs;
//! `disconnect()` writes `Disconnected` after the task has been stopped.
//! Readers get a lock-free status snapshot or a cloned record.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use mcpchat_core::{
    ClientError, ConnectionRecord, ConnectionSettings, ConnectionStatus, EndpointClient,
    EndpointConfig, ReconnectProgress, SharedEventBus, StatusChanged,
};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::health::HealthChecker;
use crate::reconnect::ReconnectionStrategy;

/// Upper bound for releasing a transport
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Running maintenance loop; resolves to the final release outcome
struct MaintenanceTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), String>>,
}

/// State shared between the lifecycle handle and its maintenance task
struct LifecycleState {
    config: EndpointConfig,
    client: Arc<dyn EndpointClient>,
    event_bus: SharedEventBus,
    strategy: ReconnectionStrategy,
    health: HealthChecker,
    connect_timeout: Duration,
    status: AtomicU8,
    record: RwLock<ConnectionRecord>,
}

/// Owns one endpoint's connection and keeps it alive
pub struct ConnectionLifecycle {
    state: Arc<LifecycleState>,
    task: Mutex<Option<MaintenanceTask>>,
    /// Serializes connect/disconnect so they never interleave
    op_lock: tokio::sync::Mutex<()>,
}

impl ConnectionLifecycle {
    pub fn new(
        config: EndpointConfig,
        client: Arc<dyn EndpointClient>,
        settings: &ConnectionSettings,
        event_bus: SharedEventBus,
    ) -> Self {
        let record = ConnectionRecord::new(&config.name);
        Self {
            state: Arc::new(LifecycleState {
                config,
                client,
                event_bus,
                strategy: ReconnectionStrategy::from_settings(settings),
                health: HealthChecker::from_settings(settings),
                connect_timeout: settings.connect_timeout,
                status: AtomicU8::new(ConnectionStatus::Disconnected.as_u8()),
                record: RwLock::new(record),
            }),
            task: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.config.name
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.state.config
    }

    pub fn client(&self) -> Arc<dyn EndpointClient> {
        self.state.client.clone()
    }

    /// Current status (lock-free)
    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// Snapshot of the connection record
    pub fn record(&self) -> ConnectionRecord {
        self.state.record.read().clone()
    }

    /// Whether a maintenance loop is currently running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the maintenance loop
    ///
    /// Valid from `Disconnected` or `Error` with no loop running. Connection
    /// failures never surface here; they show up as status and events.
    pub async fn connect(&self) -> Result<(), LifecycleError> {
        let _op = self.op_lock.lock().await;

        let finished = {
            let mut slot = self.task.lock();
            let running = slot
                .as_ref()
                .is_some_and(|task| !task.handle.is_finished());
            let status = self.status();
            if running || !status.accepts_connect() {
                return Err(LifecycleError::InvalidState {
                    endpoint: self.name().to_string(),
                    status,
                });
            }
            slot.take()
        };
        if let Some(task) = finished {
            match task.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => warn!(
                    endpoint = %self.name(),
                    reason = %reason,
                    "[Lifecycle] Previous maintenance loop left the transport unreleased"
                ),
                Err(e) => error!(
                    endpoint = %self.name(),
                    error = %e,
                    "[Lifecycle] Previous maintenance task failed"
                ),
            }
        }

        // A manual connect starts with a fresh retry budget
        {
            let mut record = self.state.record.write();
            record.reconnect_attempt = 0;
            record.last_error = None;
        }

        let cancel = CancellationToken::new();
        let state = self.state.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let maintained = AssertUnwindSafe(state.maintain(&task_cancel))
                .catch_unwind()
                .await;
            if let Err(panic) = maintained {
                state.fail_with_panic(&panic_message(panic.as_ref()));
            }
            state.release().await
        });

        info!(endpoint = %self.name(), "[Lifecycle] Maintenance loop started");
        *self.task.lock() = Some(MaintenanceTask { cancel, handle });
        Ok(())
    }

    /// Stop the maintenance loop, release the transport, go `Disconnected`
    ///
    /// Idempotent: a second call is a no-op and publishes nothing.
    pub async fn disconnect(&self) {
        let _ = self.shutdown().await;
    }

    /// Same as [`disconnect`](Self::disconnect), but reports a transport
    /// that could not be released or a maintenance task that died
    ///
    /// The status is `Disconnected` either way.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        let _op = self.op_lock.lock().await;

        let mut outcome = Ok(());
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            match task.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => {
                    outcome = Err(LifecycleError::ReleaseFailed {
                        endpoint: self.name().to_string(),
                        reason,
                    });
                }
                Err(e) => {
                    // The task did not get to release the transport itself
                    error!(
                        endpoint = %self.name(),
                        error = %e,
                        "[Lifecycle] Maintenance task failed"
                    );
                    let _ = self.state.release().await;
                    outcome = Err(LifecycleError::TaskFailed {
                        endpoint: self.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            info!(endpoint = %self.name(), "[Lifecycle] Maintenance loop stopped");
        }

        self.state.transition(ConnectionStatus::Disconnected, None);
        outcome
    }

    /// Restart the loop with a fresh retry budget, whatever the current status
    pub async fn reconnect(&self) -> Result<(), LifecycleError> {
        self.disconnect().await;
        self.connect().await
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

impl LifecycleState {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Set status and publish `StatusChanged` if it actually changed
    fn transition(&self, new: ConnectionStatus, message: Option<String>) {
        let old = {
            let mut record = self.record.write();
            let old = ConnectionStatus::from_u8(self.status.swap(new.as_u8(), Ordering::AcqRel));
            record.status = new;
            old
        };
        if old == new {
            return;
        }

        debug!(
            endpoint = %self.config.name,
            from = %old,
            to = %new,
            "[Lifecycle] Status transition"
        );
        self.event_bus.publish(
            StatusChanged {
                endpoint: self.config.name.clone(),
                old,
                new,
                message,
            }
            .into(),
        );
    }

    /// Maintenance loop: connect, watch health, back off, retry
    async fn maintain(&self, cancel: &CancellationToken) {
        let name = self.config.name.as_str();

        loop {
            self.transition(ConnectionStatus::Connecting, None);
            self.record.write().last_attempt_at = Some(Utc::now());

            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(
                    self.connect_timeout,
                    self.client.connect(self.connect_timeout),
                ) => result.unwrap_or(Err(ClientError::Timeout(self.connect_timeout))),
            };

            let failure = match connected {
                Ok(()) => {
                    self.mark_connected();
                    let mut monitor =
                        self.health
                            .spawn(name.to_string(), self.client.clone(), cancel);
                    let failure = tokio::select! {
                        _ = cancel.cancelled() => None,
                        error = monitor.failed() => Some(error),
                        _ = self.client.closed() => {
                            warn!(endpoint = name, "[Lifecycle] Transport closed while connected");
                            Some(ClientError::Transport("transport closed".to_string()))
                        }
                    };
                    monitor.stop().await;
                    match failure {
                        Some(error) => error,
                        None => return,
                    }
                }
                Err(error) => {
                    warn!(endpoint = name, error = %error, "[Lifecycle] Connect attempt failed");
                    error
                }
            };

            let attempt = {
                let mut record = self.record.write();
                record.reconnect_attempt += 1;
                record.last_error = Some(failure.to_string());
                record.reconnect_attempt
            };
            let decision = self.strategy.next(attempt);

            if decision.give_up {
                error!(
                    endpoint = name,
                    attempts = attempt - 1,
                    error = %failure,
                    "[Lifecycle] Reconnect attempts exhausted, giving up"
                );
                self.transition(ConnectionStatus::Error, Some(failure.to_string()));
                return;
            }

            self.transition(ConnectionStatus::Reconnecting, Some(failure.to_string()));
            let _ = self.release().await;

            info!(
                endpoint = name,
                attempt,
                delay_ms = decision.delay.as_millis() as u64,
                "[Lifecycle] Scheduling reconnect"
            );
            self.event_bus.publish(
                ReconnectProgress {
                    endpoint: self.config.name.clone(),
                    attempt,
                    max_attempts: self.strategy.max_attempts(),
                    next_delay: decision.delay,
                }
                .into(),
            );

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(decision.delay) => {}
            }
        }
    }

    fn mark_connected(&self) {
        {
            let mut record = self.record.write();
            record.reconnect_attempt = 0;
            record.last_error = None;
            record.last_connected_at = Some(Utc::now());
            record.connect_count += 1;
        }
        info!(endpoint = %self.config.name, "[Lifecycle] Connected");
        self.transition(ConnectionStatus::Connected, None);
    }

    /// Record a panic in the maintenance loop as a terminal failure
    fn fail_with_panic(&self, reason: &str) {
        let message = format!("maintenance loop panicked: {reason}");
        error!(endpoint = %self.config.name, reason, "[Lifecycle] Maintenance loop panicked");
        self.record.write().last_error = Some(message.clone());
        self.transition(ConnectionStatus::Error, Some(message));
    }

    /// Release the transport, bounded by a timeout
    ///
    /// A client that stalls or panics while releasing is reported as `Err`.
    async fn release(&self) -> Result<(), String> {
        let released = tokio::time::timeout(
            RELEASE_TIMEOUT,
            AssertUnwindSafe(self.client.disconnect()).catch_unwind(),
        )
        .await;

        let reason = match released {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(panic)) => format!(
                "transport release panicked: {}",
                panic_message(panic.as_ref())
            ),
            Err(_) => format!("transport release timed out after {RELEASE_TIMEOUT:?}"),
        };
        warn!(endpoint = %self.config.name, reason = %reason, "[Lifecycle] Transport release failed");
        Err(reason)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
