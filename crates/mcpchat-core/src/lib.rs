//! # mcpchat Core Library
//!
//! Domain types shared by every mcpchat crate.
//!
//! ## Modules
//!
//! - `domain` - Configuration, connection status/records, artifacts, events
//! - `client` - The `EndpointClient` contract the connection core drives
//! - `event_bus` - Synchronous, typed event distribution
//! - `error` - Configuration and client error types

pub mod client;
pub mod domain;
pub mod error;
pub mod event_bus;

// Re-export commonly used types
pub use client::{EndpointClient, EndpointClientFactory, ListChangedListener};
pub use domain::*;
pub use error::{ClientError, ClientResult, ConfigError};
pub use event_bus::{
    create_shared_event_bus, EventBus, EventReceiver, SharedEventBus, SubscriptionId,
};
