//! Event bus delivery semantics

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcpchat_core::{
    create_shared_event_bus, ArtifactCollection, ArtifactDiff, ArtifactsChanged, ClientEvent,
    ConnectionStatus, EventKind, MaxAttempts, ReconnectProgress, StatusChanged,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tests::events::EventRecorder;

fn status(endpoint: &str, old: ConnectionStatus, new: ConnectionStatus) -> ClientEvent {
    StatusChanged {
        endpoint: endpoint.to_string(),
        old,
        new,
        message: None,
    }
    .into()
}

fn progress(endpoint: &str, attempt: u32) -> ClientEvent {
    ReconnectProgress {
        endpoint: endpoint.to_string(),
        attempt,
        max_attempts: MaxAttempts::Bounded(5),
        next_delay: Duration::from_secs(1),
    }
    .into()
}

#[test]
fn test_recorder_sees_all_kinds_in_publish_order() {
    let bus = create_shared_event_bus();
    let (recorder, _) = EventRecorder::attach(&bus);

    bus.publish(status("docs", ConnectionStatus::Disconnected, ConnectionStatus::Connecting));
    bus.publish(progress("docs", 1));
    bus.publish(
        ArtifactsChanged {
            endpoint: "docs".to_string(),
            collection: ArtifactCollection::new(),
            changed: false,
            diff: ArtifactDiff::default(),
        }
        .into(),
    );

    let kinds: Vec<EventKind> = recorder.events().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::StatusChanged,
            EventKind::ReconnectProgress,
            EventKind::ArtifactsChanged,
        ]
    );
}

#[test]
fn test_panicking_handler_does_not_block_others() {
    let bus = create_shared_event_bus();
    let seen = Arc::new(AtomicUsize::new(0));

    bus.subscribe::<StatusChanged, _>(|_| panic!("handler bug"));
    let counter = seen.clone();
    bus.subscribe::<StatusChanged, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let delivered = bus.publish(status(
        "docs",
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
    ));
    assert_eq!(delivered, 1);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // The bus keeps working after the panic
    bus.publish(status(
        "docs",
        ConnectionStatus::Connected,
        ConnectionStatus::Reconnecting,
    ));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_handler_can_unsubscribe_itself() {
    let bus = create_shared_event_bus();
    let calls = Arc::new(AtomicUsize::new(0));
    let id = Arc::new(Mutex::new(None));

    let handler_bus = bus.clone();
    let handler_id = id.clone();
    let counter = calls.clone();
    let subscription = bus.subscribe::<ReconnectProgress, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = handler_id.lock().take() {
            handler_bus.unsubscribe(id);
        }
    });
    *id.lock() = Some(subscription);

    bus.publish(progress("docs", 1));
    bus.publish(progress("docs", 2));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(EventKind::ReconnectProgress), 0);
}

#[tokio::test]
async fn test_channel_subscription_forwards_events() {
    let bus = create_shared_event_bus();
    let (id, mut receiver) = bus.subscribe_channel(EventKind::StatusChanged);

    bus.publish(progress("docs", 1));
    bus.publish(status("docs", ConnectionStatus::Connecting, ConnectionStatus::Connected));

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.endpoint(), "docs");
    assert!(matches!(
        event,
        ClientEvent::StatusChanged(StatusChanged { new: ConnectionStatus::Connected, .. })
    ));
    assert!(receiver.try_recv().is_none());

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
}

#[test]
fn test_events_serialize_with_type_tag() {
    let event = status("docs", ConnectionStatus::Connected, ConnectionStatus::Reconnecting);
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["type"], "status_changed");
    assert_eq!(json["endpoint"], "docs");
    assert_eq!(json["old"], "connected");
    assert_eq!(json["new"], "reconnecting");
    assert!(json.get("message").is_none());
}
