//! Artifact repository - stateless fetch layer
//!
//! Lists tools, resources and prompts concurrently. Each list call has its own
//! timeout and a bounded retry for transient failures; a kind that still fails
//! degrades to an empty list. The whole fetch is bounded too.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mcpchat_core::{
    ArtifactCollection, ArtifactKind, ClientError, ClientResult, ConnectionSettings,
    EndpointClient,
};
use tracing::{debug, info, warn};

/// Delay before the first retry of a failed list call; doubles per retry
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactRepository {
    call_timeout: Duration,
    fetch_timeout: Duration,
    retries: u32,
}

impl ArtifactRepository {
    pub fn new(call_timeout: Duration, fetch_timeout: Duration, retries: u32) -> Self {
        Self {
            call_timeout,
            fetch_timeout,
            retries,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self::new(
            settings.call_timeout,
            settings.fetch_timeout,
            settings.call_retries,
        )
    }

    /// Fetch one endpoint's artifacts; never fails
    pub async fn fetch(&self, endpoint: &str, client: &dyn EndpointClient) -> ArtifactCollection {
        debug!(endpoint, "[ArtifactRepository] Fetching artifacts");

        let fetch_all = async {
            let (tools, resources, prompts) = tokio::join!(
                self.list(endpoint, ArtifactKind::Tool, || client.list_tools(self.call_timeout)),
                self.list(endpoint, ArtifactKind::Resource, || client
                    .list_resources(self.call_timeout)),
                self.list(endpoint, ArtifactKind::Prompt, || client
                    .list_prompts(self.call_timeout)),
            );
            ArtifactCollection {
                tools,
                resources,
                prompts,
            }
        };

        match tokio::time::timeout(self.fetch_timeout, fetch_all).await {
            Ok(collection) => {
                info!(
                    endpoint,
                    tools = collection.tools.len(),
                    resources = collection.resources.len(),
                    prompts = collection.prompts.len(),
                    "[ArtifactRepository] Fetched artifacts"
                );
                collection
            }
            Err(_) => {
                warn!(
                    endpoint,
                    timeout = ?self.fetch_timeout,
                    "[ArtifactRepository] Fetch timed out, returning empty collection"
                );
                ArtifactCollection::new()
            }
        }
    }

    /// Fetch several endpoints concurrently, preserving input order
    pub async fn fetch_all(
        &self,
        endpoints: &[(String, Arc<dyn EndpointClient>)],
    ) -> Vec<(String, ArtifactCollection)> {
        let fetches = endpoints.iter().map(|(name, client)| async move {
            (name.clone(), self.fetch(name, client.as_ref()).await)
        });
        join_all(fetches).await
    }

    /// Run one list call with timeout and retry; failures become an empty list
    async fn list<T, F, Fut>(&self, endpoint: &str, kind: ArtifactKind, call: F) -> Vec<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<Vec<T>>>,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(self.call_timeout, call())
                .await
                .unwrap_or(Err(ClientError::Timeout(self.call_timeout)));

            match result {
                Ok(items) => return items,
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    debug!(
                        endpoint,
                        kind = kind.as_str(),
                        attempt,
                        error = %e,
                        "[ArtifactRepository] List call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        endpoint,
                        kind = kind.as_str(),
                        error = %e,
                        "[ArtifactRepository] Failed to list {}s",
                        kind.as_str()
                    );
                    return Vec::new();
                }
            }
        }
    }
}
