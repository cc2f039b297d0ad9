//! Artifact synchronization: fetch, cache, detect changes

mod cache;
mod detector;
mod repository;

pub use cache::ArtifactCache;
pub use detector::{diff_collections, ChangeDetector, ChangeReport};
pub use repository::ArtifactRepository;
