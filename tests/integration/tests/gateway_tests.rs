//! Gateway session manager integration tests
//!
//! Drive a real `SessionManager` against the in-process WebSocket server.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use chat_gateway::{
    ConnectionState, DisconnectReason, EventKind, FrameType, GatewayError, GatewayEvent,
};
use integration_tests::{
    test_manager, EventRecorder, ServerBehavior, TestGateway,
};
use std::time::Duration;

// ============================================================================
// Connect / Hello / Disconnect
// ============================================================================

#[tokio::test]
async fn test_connect_receives_hello_and_reaches_connected() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let manager = test_manager(&gateway.url, 30_000);

    let connected = EventRecorder::new();
    connected.attach(&manager, EventKind::Connected);

    manager.connect().await.expect("connect");

    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.session_id().as_deref(), Some("sess-1"));
    assert_eq!(connected.count(), 1);

    // The connect URL carried the auth token
    let uris = gateway.observed.uris.lock().clone();
    assert!(uris[0].contains("token=test-token"));

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_while_connected_is_an_invalid_state() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let manager = test_manager(&gateway.url, 30_000);

    manager.connect().await.expect("connect");
    let err = manager.connect().await.expect_err("second connect");
    assert!(matches!(err, GatewayError::InvalidState(_)));

    manager.disconnect().await;
}

#[tokio::test]
async fn test_deliberate_disconnect_closes_with_normal_code() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let manager = test_manager(&gateway.url, 30_000);

    let disconnected = EventRecorder::new();
    disconnected.attach(&manager, EventKind::Disconnected);

    manager.connect().await.expect("connect");
    manager.disconnect().await;

    let events = disconnected.snapshot();
    assert_eq!(events.len(), 1);
    match &events[0] {
        GatewayEvent::Disconnected { reason } => {
            assert_eq!(*reason, DisconnectReason::Requested);
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }

    integration_tests::wait_for("close code delivery", Duration::from_secs(1), || {
        !gateway.observed.close_codes.lock().is_empty()
    })
    .await;
    assert_eq!(gateway.observed.close_codes.lock()[0], 1000);
}

#[tokio::test]
async fn test_missing_hello_fails_the_connect_attempt() {
    let gateway = TestGateway::spawn(ServerBehavior::NoHello).await;
    let manager = test_manager(&gateway.url, 30_000);

    let err = manager.connect().await.expect_err("connect without hello");
    assert!(matches!(err, GatewayError::HelloTimeout(_)));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

// ============================================================================
// Dispatch ordering
// ============================================================================

#[tokio::test]
async fn test_dispatches_arrive_in_order_and_advance_the_sequence() {
    let events = vec![
        (1, integration_tests::message_create_envelope(101, 7)),
        (2, integration_tests::message_create_envelope(102, 7)),
        (3, integration_tests::message_create_envelope(103, 7)),
    ];
    let gateway = TestGateway::spawn(ServerBehavior::Normal { events }).await;
    let manager = test_manager(&gateway.url, 30_000);

    let recorder = EventRecorder::new();
    recorder.attach(&manager, EventKind::Dispatch);

    manager.connect().await.expect("connect");

    integration_tests::wait_for("three dispatches", Duration::from_secs(2), || {
        recorder.count() == 3
    })
    .await;

    let sequences: Vec<Option<u64>> = recorder
        .snapshot()
        .iter()
        .map(|event| match event {
            GatewayEvent::Dispatch { sequence, .. } => *sequence,
            other => panic!("expected Dispatch, got {other:?}"),
        })
        .collect();
    assert_eq!(sequences, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(manager.sequence(), Some(3));

    manager.disconnect().await;
}

// ============================================================================
// Heartbeat / latency
// ============================================================================

#[tokio::test]
async fn test_pong_updates_latency_and_notifies() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let manager = test_manager(&gateway.url, 100);

    let latency_events = EventRecorder::new();
    latency_events.attach(&manager, EventKind::LatencyUpdated);

    manager.connect().await.expect("connect");

    integration_tests::wait_for("first latency sample", Duration::from_secs(2), || {
        manager.latency().is_some()
    })
    .await;

    // The first notification carries no previous value
    match &latency_events.snapshot()[0] {
        GatewayEvent::LatencyUpdated { previous, current } => {
            assert!(previous.is_none());
            assert!(*current < Duration::from_secs(1));
        }
        other => panic!("expected LatencyUpdated, got {other:?}"),
    }

    // The server saw our pings
    assert!(gateway.observed.frames_of(FrameType::Ping) >= 1);

    manager.disconnect().await;
}

#[tokio::test]
async fn test_silent_server_faults_exactly_once() {
    let gateway = TestGateway::spawn(ServerBehavior::SilentAfterHello).await;
    let manager = test_manager(&gateway.url, 100);

    let disconnected = EventRecorder::new();
    disconnected.attach(&manager, EventKind::Disconnected);

    manager.connect().await.expect("connect");

    integration_tests::wait_for("heartbeat fault", Duration::from_secs(3), || {
        disconnected.count() >= 1
    })
    .await;

    // Give any repeated detection a chance to misfire before asserting
    tokio::time::sleep(Duration::from_millis(400)).await;

    let events = disconnected.snapshot();
    assert_eq!(events.len(), 1);
    match &events[0] {
        GatewayEvent::Disconnected { reason } => {
            assert_eq!(*reason, DisconnectReason::HeartbeatTimeout);
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

// ============================================================================
// Server-driven reconnect
// ============================================================================

#[tokio::test]
async fn test_reconnect_frame_tears_down_with_reconnect_close_code() {
    let gateway = TestGateway::spawn(ServerBehavior::ReconnectAfterHello).await;
    let manager = test_manager(&gateway.url, 30_000);

    let disconnected = EventRecorder::new();
    disconnected.attach(&manager, EventKind::Disconnected);

    manager.connect().await.expect("connect");

    integration_tests::wait_for("reconnect teardown", Duration::from_secs(2), || {
        disconnected.count() >= 1
    })
    .await;

    match &disconnected.snapshot()[0] {
        GatewayEvent::Disconnected { reason } => {
            assert_eq!(*reason, DisconnectReason::ReconnectRequested);
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }

    // The close told the server this was a reconnect handoff, not a fault
    integration_tests::wait_for("close code delivery", Duration::from_secs(1), || {
        !gateway.observed.close_codes.lock().is_empty()
    })
    .await;
    assert_eq!(gateway.observed.close_codes.lock()[0], 4000);
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resume_rides_the_next_connect_as_query_parameters() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let manager = test_manager(&gateway.url, 30_000);

    let resumed = EventRecorder::new();
    resumed.attach(&manager, EventKind::Resumed);

    manager.connect().await.expect("first connect");
    manager.disconnect().await;

    // The torn-down session is available for the resume decision
    let last = manager.last_session().expect("last session");
    assert_eq!(last.session_id, "sess-1");
    manager.set_resume(last.session_id, last.sequence);

    manager.connect().await.expect("resumed connect");

    let uris = gateway.observed.uris.lock().clone();
    assert!(!uris[0].contains("resume=1"));
    assert!(uris[1].contains("resume=1"));
    assert!(uris[1].contains("session_id=sess-1"));
    assert!(uris[1].contains("sn=0"));

    integration_tests::wait_for("resume ack", Duration::from_secs(2), || {
        resumed.count() >= 1
    })
    .await;

    // Clearing forces a fresh identify afterwards
    manager.disconnect().await;
    manager.clear_resume();
    manager.connect().await.expect("fresh connect");
    assert!(!gateway.observed.uris.lock()[2].contains("resume"));

    manager.disconnect().await;
}
