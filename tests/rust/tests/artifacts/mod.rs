//! Artifact repository, cache and change detection against scripted clients

mod sync;
