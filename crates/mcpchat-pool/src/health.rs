//! Health checker: timer + probe + signal
//!
//! Holds no connection state. Each tick it probes the endpoint with a short
//! timeout; the first failure is signalled to the owner and the checker stops.

use std::sync::Arc;
use std::time::Duration;

use mcpchat_core::{ClientError, ConnectionSettings, EndpointClient};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChecker {
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            interval,
            probe_timeout,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self::new(settings.health_check_interval, settings.probe_timeout)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe every interval until a probe fails or `cancel` fires
    ///
    /// Returns the probe error, or `None` when cancelled. The first probe
    /// runs one full interval after the call.
    pub async fn run(
        &self,
        endpoint: &str,
        client: &dyn EndpointClient,
        cancel: &CancellationToken,
    ) -> Option<ClientError> {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = ticker.tick() => {}
            }

            // The client is handed the timeout but not trusted to honour it
            let result = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = tokio::time::timeout(
                    self.probe_timeout,
                    client.probe(self.probe_timeout),
                ) => result.unwrap_or(Err(ClientError::Timeout(self.probe_timeout))),
            };

            match result {
                Ok(()) => debug!(endpoint, "[HealthChecker] Probe succeeded"),
                Err(e) => {
                    warn!(endpoint, error = %e, "[HealthChecker] Probe failed");
                    return Some(e);
                }
            }
        }
    }

    /// Run the checker on its own task
    ///
    /// The task stops on the first failure, when `cancel` fires, or when the
    /// returned monitor is dropped.
    pub fn spawn(
        &self,
        endpoint: String,
        client: Arc<dyn EndpointClient>,
        cancel: &CancellationToken,
    ) -> HealthMonitor {
        let token = cancel.child_token();
        let (failure_tx, failure_rx) = oneshot::channel();
        let checker = *self;
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            if let Some(error) = checker.run(&endpoint, client.as_ref(), &task_token).await {
                let _ = failure_tx.send(error);
            }
        });

        HealthMonitor {
            failure: failure_rx,
            token,
            handle: Some(handle),
        }
    }
}

/// Owner side of a spawned [`HealthChecker`]
pub struct HealthMonitor {
    failure: oneshot::Receiver<ClientError>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Wait for the first probe failure
    ///
    /// Pends forever if the checker was stopped without a failure, so callers
    /// select on it together with their own cancellation.
    pub async fn failed(&mut self) -> ClientError {
        match (&mut self.failure).await {
            Ok(error) => error,
            Err(_) => std::future::pending().await,
        }
    }

    /// Cancel the checker and wait for its task to finish
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
