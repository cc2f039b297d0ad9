//! Last-known artifact snapshot per endpoint
//!
//! Values go in and come out by copy: nothing outside the cache ever holds a
//! reference into a stored collection.

use dashmap::DashMap;
use mcpchat_core::ArtifactCollection;

#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: DashMap<String, ArtifactCollection>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored collection
    pub fn get(&self, endpoint: &str) -> Option<ArtifactCollection> {
        self.entries.get(endpoint).map(|entry| entry.value().clone())
    }

    /// Store a copy of `collection`, replacing any previous snapshot
    pub fn set(&self, endpoint: &str, collection: &ArtifactCollection) {
        self.entries.insert(endpoint.to_string(), collection.clone());
    }

    /// Drop the snapshot; returns it if there was one
    pub fn remove(&self, endpoint: &str) -> Option<ArtifactCollection> {
        self.entries.remove(endpoint).map(|(_, collection)| collection)
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.entries.contains_key(endpoint)
    }

    /// Run `f` against the stored value without copying it out
    pub(crate) fn with<R>(
        &self,
        endpoint: &str,
        f: impl FnOnce(&ArtifactCollection) -> R,
    ) -> Option<R> {
        self.entries.get(endpoint).map(|entry| f(entry.value()))
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
