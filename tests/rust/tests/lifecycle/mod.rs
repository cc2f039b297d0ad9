//! Connection lifecycle integration tests
//!
//! Drive a single ConnectionLifecycle against scripted clients under paused
//! time and check statuses, records and published events.

mod state_machine;

use std::sync::Arc;

use mcpchat_core::{create_shared_event_bus, MaxAttempts};
use mcpchat_pool::ConnectionLifecycle;
use tests::events::EventRecorder;
use tests::{fixtures, MockEndpointClient};

/// Lifecycle for `client` with deterministic settings and a recorder attached
pub(crate) fn lifecycle(
    client: &Arc<MockEndpointClient>,
    max_attempts: MaxAttempts,
) -> (ConnectionLifecycle, EventRecorder) {
    tests::init_test_tracing();
    let bus = create_shared_event_bus();
    let (recorder, _) = EventRecorder::attach(&bus);
    let lifecycle = ConnectionLifecycle::new(
        fixtures::endpoint(client.name()),
        client.clone(),
        &fixtures::settings(max_attempts),
        bus,
    );
    (lifecycle, recorder)
}
