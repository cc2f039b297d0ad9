//! Domain types: configuration, connection status, artifacts, and events

mod artifact;
pub mod config;
mod event;
mod status;

pub use artifact::*;
pub use config::{
    ChatConfig, ConnectionSettings, EndpointConfig, MaxAttempts, TransportSpec,
    normalize_endpoint_name, validate_endpoints,
};
pub use event::*;
pub use status::*;
