//! Client facade integration tests
//!
//! Exercise the full wiring: scripted REST transport under the
//! dispatcher, a real gateway session feeding the message cache, and the
//! reconnect policy driving the session manager.
//!
//! Run with: cargo test -p integration-tests --test client_tests

use chat_client::{
    ChatClient, ClientError, ConnectionState, Direction, ReconnectPolicy, Snowflake,
};
use chat_common::{CacheConfig, ClientConfig, Environment, GatewayConfig, LimiterConfig, RestConfig};
use chat_limiter::{RateLimitHeaders, RequestError};
use integration_tests::{
    message_create_envelope, message_delete_envelope, message_json, ok_response, status_response,
    wait_for, ScriptedTransport, ServerBehavior, TestGateway,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn client_config(gateway_url: &str) -> ClientConfig {
    ClientConfig {
        token: "test-token".to_string(),
        env: Environment::Development,
        rest: RestConfig {
            base_url: "http://rest.invalid".to_string(),
            request_timeout_secs: 5,
        },
        gateway: GatewayConfig {
            url: Some(gateway_url.to_string()),
            heartbeat_interval_ms: 30_000,
            hello_timeout_ms: 1_000,
        },
        limiter: LimiterConfig::default(),
        cache: CacheConfig {
            message_capacity: 100,
        },
    }
}

// ============================================================================
// REST surface
// ============================================================================

#[tokio::test]
async fn test_current_user_decodes_through_the_dispatcher() {
    let transport = ScriptedTransport::new(vec![Ok(ok_response(
        RateLimitHeaders::default(),
        serde_json::json!({ "id": "31", "username": "quokka" }),
    ))]);
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let client = ChatClient::with_transport(client_config(&gateway.url), transport.clone());

    let user = client.current_user().await.expect("current user");
    assert_eq!(user.id, Snowflake::new(31));
    assert_eq!(user.username, "quokka");
    assert_eq!(transport.paths.lock()[0], "/users/@me");
}

#[tokio::test]
async fn test_send_returns_the_created_message_and_caches_it() {
    let transport = ScriptedTransport::new(vec![Ok(ok_response(
        RateLimitHeaders::default(),
        message_json(500, 7),
    ))]);
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let client = ChatClient::with_transport(client_config(&gateway.url), transport.clone());

    let channel = client.channel(Snowflake::new(7));
    let sent = channel.send("message 500").await.expect("send");

    assert_eq!(sent.id, Snowflake::new(500));
    assert_eq!(channel.cached(Snowflake::new(500)).unwrap().id, sent.id);
    assert_eq!(transport.paths.lock()[0], "/channels/7/messages");
}

#[tokio::test]
async fn test_server_rejection_surfaces_the_decoded_error() {
    let transport = ScriptedTransport::new(vec![Ok(status_response(
        403,
        RateLimitHeaders::default(),
        br#"{"code":"MISSING_ACCESS","message":"Missing access"}"#,
    ))]);
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let client = ChatClient::with_transport(client_config(&gateway.url), transport);

    let err = client
        .channel(Snowflake::new(7))
        .send("nope")
        .await
        .expect_err("rejected send");

    match err {
        ClientError::Request(RequestError::Rejected { status, error }) => {
            assert_eq!(status, 403);
            assert_eq!(error.code, "MISSING_ACCESS");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

// ============================================================================
// Gateway dispatches feed the cache
// ============================================================================

#[tokio::test]
async fn test_message_dispatches_fill_and_prune_the_cache() {
    let events = vec![
        (1, message_create_envelope(201, 7)),
        (2, message_create_envelope(202, 7)),
        (3, message_create_envelope(203, 7)),
        (4, message_delete_envelope(202, 7)),
    ];
    let transport = ScriptedTransport::new(Vec::new());
    let gateway = TestGateway::spawn(ServerBehavior::Normal { events }).await;
    let client = ChatClient::with_transport(client_config(&gateway.url), transport.clone());

    client.connect().await.expect("connect");

    wait_for("cache fed from dispatches", Duration::from_secs(2), || {
        client.cache().len() == 2
    })
    .await;

    let channel = client.channel(Snowflake::new(7));
    assert!(channel.cached(Snowflake::new(201)).is_some());
    assert!(channel.cached(Snowflake::new(202)).is_none());
    assert!(channel.cached(Snowflake::new(203)).is_some());

    // A range the cache can serve entirely issues no REST call
    let recent = channel.messages(None, None, 2).await.expect("messages");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, Snowflake::new(203));
    assert_eq!(transport.executed(), 0);

    client.disconnect().await;
}

#[tokio::test]
async fn test_cache_shortfall_backfills_through_rest() {
    let page = serde_json::json!([message_json(102, 7), message_json(101, 7)]);
    let transport = ScriptedTransport::new(vec![Ok(ok_response(RateLimitHeaders::default(), page))]);
    let events = vec![
        (1, message_create_envelope(103, 7)),
        (2, message_create_envelope(104, 7)),
    ];
    let gateway = TestGateway::spawn(ServerBehavior::Normal { events }).await;
    let client = ChatClient::with_transport(client_config(&gateway.url), transport.clone());

    client.connect().await.expect("connect");
    wait_for("cache fed", Duration::from_secs(2), || client.cache().len() == 2).await;

    let channel = client.channel(Snowflake::new(7));
    let result = channel
        .messages(Some(Snowflake::new(105)), Some(Direction::Before), 4)
        .await
        .expect("messages");

    let ids: Vec<i64> = result.iter().map(|m| m.id.into_inner()).collect();
    assert_eq!(ids, vec![104, 103, 102, 101]);

    // The backfill continued past the oldest cached entry
    assert_eq!(
        transport.paths.lock()[0],
        "/channels/7/messages?limit=2&before=103"
    );

    client.disconnect().await;
}

// ============================================================================
// Reconnect policy
// ============================================================================

#[tokio::test]
async fn test_reconnect_policy_resumes_after_a_server_reconnect() {
    let gateway = TestGateway::spawn(ServerBehavior::ReconnectAfterHello).await;
    let transport = ScriptedTransport::new(Vec::new());
    let client = ChatClient::with_transport(client_config(&gateway.url), transport);

    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_secs(1),
        max_attempts: Some(3),
    };
    policy.install(client.gateway());

    client.connect().await.expect("connect");

    // The server reconnect request tears the session down; the policy
    // waits out its backoff plus the identify window and reconnects
    wait_for("policy reconnects", Duration::from_secs(10), || {
        gateway.observed.connections.load(Ordering::SeqCst) >= 2
    })
    .await;

    // The second connect asked to resume the first session
    wait_for("resume query recorded", Duration::from_secs(2), || {
        gateway.observed.uris.lock().len() >= 2
    })
    .await;
    let uris = gateway.observed.uris.lock().clone();
    assert!(uris[1].contains("resume=1"));
    assert!(uris[1].contains("session_id=sess-1"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_client_starts_disconnected_and_reports_state() {
    let gateway = TestGateway::spawn(ServerBehavior::normal()).await;
    let transport = ScriptedTransport::new(Vec::new());
    let client = ChatClient::with_transport(client_config(&gateway.url), transport);

    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.connect().await.expect("connect");
    assert_eq!(client.state(), ConnectionState::Connected);
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
