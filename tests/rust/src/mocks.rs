//! Scripted endpoint clients for testing
//!
//! A [`MockEndpointClient`] plays back a script of connect outcomes and
//! serves whatever artifacts the test configures. Every call is counted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use mcpchat_core::{
    ArtifactCollection, ArtifactKind, ClientError, ClientResult, EndpointClient,
    EndpointClientFactory, EndpointConfig, ListChangedListener, PromptArtifact, ResourceArtifact,
    ToolArtifact,
};

/// What the next `connect()` call does
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Succeed,
    Fail(ClientError),
    /// Never completes; the caller's timeout has to fire
    Hang,
    /// Panics inside the connect call
    Panic,
}

impl ConnectOutcome {
    pub fn refused() -> Self {
        Self::Fail(ClientError::Transport("connection refused".to_string()))
    }
}

/// What `disconnect()` does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseBehavior {
    Clean,
    /// Never completes
    Stall,
    Panic,
}

// ============================================================================
// MockEndpointClient
// ============================================================================

pub struct MockEndpointClient {
    name: String,
    script: Mutex<VecDeque<ConnectOutcome>>,
    /// Used once the script is exhausted
    fallback: Mutex<ConnectOutcome>,
    connected: watch::Sender<bool>,
    probe_fails: AtomicBool,
    health_stalls: AtomicBool,
    release: Mutex<ReleaseBehavior>,
    artifacts: Mutex<ArtifactCollection>,
    failing: Mutex<HashMap<ArtifactKind, ClientError>>,
    hanging: Mutex<HashSet<ArtifactKind>>,
    listener: Mutex<Option<ListChangedListener>>,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    probe_calls: AtomicU32,
    list_calls: Mutex<HashMap<ArtifactKind, u32>>,
}

impl MockEndpointClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ConnectOutcome::Succeed),
            connected: watch::Sender::new(false),
            probe_fails: AtomicBool::new(false),
            health_stalls: AtomicBool::new(false),
            release: Mutex::new(ReleaseBehavior::Clean),
            artifacts: Mutex::new(ArtifactCollection::new()),
            failing: Mutex::new(HashMap::new()),
            hanging: Mutex::new(HashSet::new()),
            listener: Mutex::new(None),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            probe_calls: AtomicU32::new(0),
            list_calls: Mutex::new(HashMap::new()),
        }
    }

    /// Outcomes for the first connect calls, in order
    pub fn with_connect_script(self, script: Vec<ConnectOutcome>) -> Self {
        *self.script.lock() = script.into();
        self
    }

    /// Outcome for every connect call after the script runs out
    pub fn with_fallback(self, outcome: ConnectOutcome) -> Self {
        *self.fallback.lock() = outcome;
        self
    }

    pub fn with_artifacts(self, artifacts: ArtifactCollection) -> Self {
        *self.artifacts.lock() = artifacts;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_artifacts(&self, artifacts: ArtifactCollection) {
        *self.artifacts.lock() = artifacts;
    }

    pub fn set_tools(&self, tools: Vec<ToolArtifact>) {
        self.artifacts.lock().tools = tools;
    }

    pub fn set_fallback(&self, outcome: ConnectOutcome) {
        *self.fallback.lock() = outcome;
    }

    pub fn fail_probes(&self, fail: bool) {
        self.probe_fails.store(fail, Ordering::SeqCst);
    }

    /// Health checks never answer, whatever timeout they are given
    pub fn stall_health_checks(&self, stall: bool) {
        self.health_stalls.store(stall, Ordering::SeqCst);
    }

    pub fn set_release(&self, behavior: ReleaseBehavior) {
        *self.release.lock() = behavior;
    }

    /// Simulate the server side dropping the session
    pub fn drop_transport(&self) {
        self.connected.send_replace(false);
    }

    pub fn fail_list(&self, kind: ArtifactKind, error: ClientError) {
        self.failing.lock().insert(kind, error);
    }

    pub fn hang_list(&self, kind: ArtifactKind) {
        self.hanging.lock().insert(kind);
    }

    /// Simulate a `list_changed` notification from the endpoint
    pub fn fire_list_changed(&self) -> bool {
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => {
                listener();
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self, kind: ArtifactKind) -> u32 {
        self.list_calls.lock().get(&kind).copied().unwrap_or(0)
    }

    async fn list<T: Clone>(
        &self,
        kind: ArtifactKind,
        select: impl FnOnce(&ArtifactCollection) -> Vec<T>,
    ) -> ClientResult<Vec<T>> {
        *self.list_calls.lock().entry(kind).or_insert(0) += 1;
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if self.hanging.lock().contains(&kind) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.failing.lock().get(&kind).cloned() {
            return Err(error);
        }
        Ok(select(&self.artifacts.lock()))
    }
}

#[async_trait]
impl EndpointClient for MockEndpointClient {
    async fn connect(&self, _timeout: Duration) -> ClientResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        match outcome {
            ConnectOutcome::Succeed => {
                self.connected.send_replace(true);
                Ok(())
            }
            ConnectOutcome::Fail(error) => Err(error),
            ConnectOutcome::Hang => std::future::pending().await,
            ConnectOutcome::Panic => panic!("{} handshake state corrupted", self.name),
        }
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.release.lock();
        match behavior {
            ReleaseBehavior::Clean => {}
            ReleaseBehavior::Stall => std::future::pending::<()>().await,
            ReleaseBehavior::Panic => panic!("{} transport already torn down", self.name),
        }
        self.connected.send_replace(false);
    }

    async fn probe(&self, _timeout: Duration) -> ClientResult<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if self.health_stalls.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("probe failed".to_string()));
        }
        Ok(())
    }

    async fn list_tools(&self, _timeout: Duration) -> ClientResult<Vec<ToolArtifact>> {
        self.list(ArtifactKind::Tool, |a| a.tools.clone()).await
    }

    async fn list_resources(&self, _timeout: Duration) -> ClientResult<Vec<ResourceArtifact>> {
        self.list(ArtifactKind::Resource, |a| a.resources.clone()).await
    }

    async fn list_prompts(&self, _timeout: Duration) -> ClientResult<Vec<PromptArtifact>> {
        self.list(ArtifactKind::Prompt, |a| a.prompts.clone()).await
    }

    async fn closed(&self) {
        let mut connected = self.connected.subscribe();
        let _ = connected.wait_for(|live| !*live).await;
    }

    fn set_list_changed_listener(&self, listener: ListChangedListener) {
        *self.listener.lock() = Some(listener);
    }
}

// ============================================================================
// MockClientFactory
// ============================================================================

/// Hands out pre-registered mocks by endpoint name
///
/// Endpoints without a registered mock get a fresh default one, which the
/// test can fetch afterwards with [`MockClientFactory::get`].
#[derive(Default)]
pub struct MockClientFactory {
    clients: Mutex<HashMap<String, Arc<MockEndpointClient>>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: MockEndpointClient) -> Arc<MockEndpointClient> {
        let client = Arc::new(client);
        self.clients
            .lock()
            .insert(client.name().to_string(), client.clone());
        client
    }

    pub fn get(&self, name: &str) -> Option<Arc<MockEndpointClient>> {
        self.clients.lock().get(name).cloned()
    }
}

impl EndpointClientFactory for MockClientFactory {
    fn create(&self, config: &EndpointConfig) -> Arc<dyn EndpointClient> {
        let client = self
            .clients
            .lock()
            .entry(config.name.clone())
            .or_insert_with(|| Arc::new(MockEndpointClient::new(&config.name)))
            .clone();
        client
    }
}
