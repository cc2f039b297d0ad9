//! Change detection between a fresh snapshot and the cached one

use std::collections::HashMap;
use std::sync::Arc;

use mcpchat_core::{Artifact, ArtifactCollection, ArtifactDiff, ArtifactId};

use super::ArtifactCache;

/// Result of [`ChangeDetector::check_and_update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub changed: bool,
    pub diff: ArtifactDiff,
}

/// Compares snapshots by artifact identity; ordering inside a list is ignored
///
/// Entries sharing an identity are compared as a multiset, so a duplicated
/// or dropped copy counts as a change to that identity.
pub struct ChangeDetector {
    cache: Arc<ArtifactCache>,
}

impl ChangeDetector {
    pub fn new(cache: Arc<ArtifactCache>) -> Self {
        Self { cache }
    }

    /// True if nothing is cached for `endpoint` or the snapshot differs
    pub fn has_changed(&self, endpoint: &str, fresh: &ArtifactCollection) -> bool {
        self.cache
            .with(endpoint, |cached| !same_index(&index(cached), &index(fresh)))
            .unwrap_or(true)
    }

    /// Identity-level diff against the cached snapshot (empty cache = all added)
    pub fn diff(&self, endpoint: &str, fresh: &ArtifactCollection) -> ArtifactDiff {
        self.cache
            .with(endpoint, |cached| diff_collections(cached, fresh))
            .unwrap_or_else(|| diff_collections(&ArtifactCollection::new(), fresh))
    }

    /// Compare, then store `fresh` as the new snapshot
    pub fn check_and_update(&self, endpoint: &str, fresh: &ArtifactCollection) -> ChangeReport {
        let changed = self.has_changed(endpoint, fresh);
        let diff = self.diff(endpoint, fresh);
        self.cache.set(endpoint, fresh);
        ChangeReport { changed, diff }
    }
}

type Index<'a> = HashMap<ArtifactId, Vec<Artifact<'a>>>;

fn index(collection: &ArtifactCollection) -> Index<'_> {
    let mut index = Index::new();
    for artifact in collection.iter() {
        index.entry(artifact.id()).or_default().push(artifact);
    }
    index
}

fn same_index(a: &Index<'_>, b: &Index<'_>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(id, entries)| b.get(id).is_some_and(|other| same_entries(entries, other)))
}

/// Order-insensitive equality that respects multiplicity
fn same_entries(a: &[Artifact<'_>], b: &[Artifact<'_>]) -> bool {
    fn count(list: &[Artifact<'_>], item: &Artifact<'_>) -> usize {
        list.iter().filter(|x| *x == item).count()
    }
    a.len() == b.len() && a.iter().all(|item| count(a, item) == count(b, item))
}

/// Compute added/removed/modified identities, each list sorted
pub fn diff_collections(old: &ArtifactCollection, new: &ArtifactCollection) -> ArtifactDiff {
    let old_index = index(old);
    let new_index = index(new);

    let mut diff = ArtifactDiff::default();
    for (id, entries) in &new_index {
        match old_index.get(id) {
            None => diff.added.push(id.clone()),
            Some(previous) if !same_entries(previous, entries) => diff.modified.push(id.clone()),
            Some(_) => {}
        }
    }
    diff.removed = old_index
        .keys()
        .filter(|id| !new_index.contains_key(*id))
        .cloned()
        .collect();

    diff.added.sort();
    diff.removed.sort();
    diff.modified.sort();
    diff
}
