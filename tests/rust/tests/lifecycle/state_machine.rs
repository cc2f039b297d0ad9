//! Connect/disconnect transitions and their guards

use std::sync::Arc;
use std::time::Duration;

use mcpchat_core::{ConnectionStatus, MaxAttempts};
use mcpchat_pool::LifecycleError;
use pretty_assertions::assert_eq;
use tests::{wait_until, ConnectOutcome, MockEndpointClient};

use super::lifecycle;

#[tokio::test(start_paused = true)]
async fn test_starts_disconnected() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    assert_eq!(lifecycle.name(), "docs");
    assert!(!lifecycle.is_running());
    assert!(recorder.is_empty());
    assert_eq!(client.connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_reaches_connected() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    lifecycle.connect().await.unwrap();
    assert!(lifecycle.is_running());
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    assert_eq!(
        recorder.statuses("docs"),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
    );
    let first = &recorder.status_changes("docs")[0];
    assert_eq!(first.old, ConnectionStatus::Disconnected);
    assert!(client.is_connected());

    lifecycle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_running_is_rejected() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    let result = lifecycle.connect().await;
    assert_eq!(
        result,
        Err(LifecycleError::InvalidState {
            endpoint: "docs".to_string(),
            status: ConnectionStatus::Connected,
        })
    );
    // The rejected call changed nothing
    assert_eq!(client.connect_calls(), 1);
    assert_eq!(recorder.statuses("docs").len(), 2);

    lifecycle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_releases_transport() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    lifecycle.disconnect().await;

    assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    assert!(!lifecycle.is_running());
    assert!(!client.is_connected());
    assert!(client.disconnect_calls() >= 1);
    assert_eq!(
        recorder.statuses("docs").last(),
        Some(&ConnectionStatus::Disconnected)
    );

    // Nothing keeps probing after the loop stopped
    let probes = client.probe_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.probe_calls(), probes);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    // Never connected: no transition, no event
    lifecycle.disconnect().await;
    assert!(recorder.is_empty());

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    lifecycle.disconnect().await;
    let after_first = recorder.len();
    lifecycle.disconnect().await;

    assert_eq!(recorder.len(), after_first);
    assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_interrupts_backoff() {
    let client = Arc::new(
        MockEndpointClient::new("docs").with_fallback(ConnectOutcome::refused()),
    );
    let (lifecycle, _recorder) = lifecycle(&client, MaxAttempts::Unbounded);

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Reconnecting)
        .await
    );

    let started = tokio::time::Instant::now();
    lifecycle.disconnect().await;

    // Returned without waiting out the backoff delay
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_interrupts_pending_connect() {
    let client = Arc::new(
        MockEndpointClient::new("docs").with_connect_script(vec![ConnectOutcome::Hang]),
    );
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_millis(500), || lifecycle.status()
            == ConnectionStatus::Connecting)
        .await
    );

    lifecycle.disconnect().await;

    assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        recorder.statuses("docs"),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Disconnected]
    );
    assert!(recorder.reconnects("docs").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_restarts_connected_lifecycle() {
    let client = Arc::new(MockEndpointClient::new("docs"));
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Bounded(3));

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    lifecycle.reconnect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );

    assert_eq!(
        recorder.statuses("docs"),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
    );
    assert_eq!(lifecycle.record().connect_count, 2);
    assert_eq!(client.connect_calls(), 2);

    lifecycle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_client_ends_in_error_and_can_reconnect() {
    let client = Arc::new(
        MockEndpointClient::new("docs").with_connect_script(vec![ConnectOutcome::Panic]),
    );
    let (lifecycle, recorder) = lifecycle(&client, MaxAttempts::Unbounded);

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Error)
        .await
    );
    assert!(!lifecycle.is_running());

    let last = recorder.status_changes("docs").pop().unwrap();
    assert_eq!(last.new, ConnectionStatus::Error);
    assert!(last
        .message
        .as_deref()
        .is_some_and(|m| m.contains("handshake state corrupted")));
    assert!(lifecycle.record().last_error.is_some());

    lifecycle.connect().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || lifecycle.status()
            == ConnectionStatus::Connected)
        .await
    );
    assert_eq!(client.connect_calls(), 2);

    lifecycle.disconnect().await;
}
