//! Core domain integration tests
//!
//! Config files on disk and event bus delivery semantics.

mod event_bus;
