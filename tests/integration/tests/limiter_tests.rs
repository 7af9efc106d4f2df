//! Rate limiter integration tests
//!
//! Concurrency-level properties of the dispatcher, run on tokio's paused
//! clock so windows elapse instantly and deterministically.
//!
//! Run with: cargo test -p integration-tests --test limiter_tests

use async_trait::async_trait;
use chat_common::LimiterConfig;
use chat_limiter::{
    BucketId, Method, RateLimitHeaders, Request, RequestError, RequestOptions, RequestQueue,
    RetryMode, Transport, TransportError, TransportResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Transport that timestamps every execution on the virtual clock
struct TimestampingTransport {
    script: Mutex<VecDeque<TransportResponse>>,
    executions: Mutex<Vec<(String, Instant)>>,
}

impl TimestampingTransport {
    fn new(script: Vec<TransportResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            executions: Mutex::new(Vec::new()),
        })
    }

    fn timestamps(&self) -> Vec<Instant> {
        self.executions.lock().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Transport for TimestampingTransport {
    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        self.executions
            .lock()
            .push((request.path.clone(), Instant::now()));
        Ok(self.script.lock().pop_front().unwrap_or(TransportResponse {
            status: 200,
            rate: RateLimitHeaders::default(),
            body: b"{}".to_vec(),
        }))
    }
}

fn request(bucket: BucketId) -> Request {
    Request::new(Method::Get, "/test").with_bucket(bucket)
}

// ============================================================================
// Admission window under concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_respect_the_window() {
    let transport = TimestampingTransport::new(Vec::new());
    let queue = RequestQueue::new(transport.clone(), LimiterConfig::default());

    // The send-edit window admits five per five seconds; eight requests
    // must split five now, three after the reset
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            queue
                .enqueue(request(BucketId::Client("send-edit")))
                .await
                .expect("enqueue")
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let timestamps = transport.timestamps();
    assert_eq!(timestamps.len(), 8);
    let in_first_window = timestamps
        .iter()
        .filter(|at| at.duration_since(start) < Duration::from_secs(5))
        .count();
    assert_eq!(in_first_window, 5);
}

// ============================================================================
// Hash convergence shares one counter
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_converged_routes_share_the_remaining_count() {
    let hashed = |remaining: i64| TransportResponse {
        status: 200,
        rate: RateLimitHeaders {
            limit: Some(3),
            remaining: Some(remaining),
            reset_after: Some(10.0),
            bucket: Some("shared".to_string()),
            global: false,
        },
        body: b"{}".to_vec(),
    };
    let transport = TimestampingTransport::new(vec![hashed(2), hashed(1)]);
    let queue = RequestQueue::new(transport.clone(), LimiterConfig::default());

    let get = BucketId::endpoint("GET", "/channels/1/messages");
    let post = BucketId::endpoint("POST", "/channels/1/messages");

    let start = Instant::now();
    // Teach both routes the shared hash; convergence accounts for the
    // in-flight ticket, leaving one of the shared window's three
    queue.enqueue(request(get.clone())).await.expect("teach get");
    queue.enqueue(request(post.clone())).await.expect("teach post");

    // One more fits the shared window; the next has to wait out the
    // 10 second reset regardless of which route it uses
    queue.enqueue(request(get)).await.expect("third");
    queue.enqueue(request(post)).await.expect("fourth");

    let timestamps = transport.timestamps();
    assert_eq!(timestamps.len(), 4);
    assert!(timestamps[2].duration_since(start) < Duration::from_secs(1));
    assert!(timestamps[3].duration_since(start) >= Duration::from_secs(10));
}

// ============================================================================
// Deadline interaction with admission stalls
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stall_past_deadline_is_a_typed_rate_limit_error() {
    let transport = TimestampingTransport::new(Vec::new());
    let queue = RequestQueue::new(transport, LimiterConfig::default());
    let bucket = BucketId::Client("identify");

    // Exhaust the 1/5s window
    queue.enqueue(request(bucket.clone())).await.expect("first");

    // With the rate-limit retry flag, the refusal is the richer error
    let mut limited = request(bucket.clone());
    limited.options = RequestOptions::default()
        .timeout_at(Instant::now() + Duration::from_secs(1));
    let err = queue.enqueue(limited).await.expect_err("over deadline");
    match err {
        RequestError::RateLimited { bucket, retry_after } => {
            assert_eq!(bucket, BucketId::Client("identify"));
            assert!(retry_after.is_some());
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // Without it, the stall is a plain deadline failure
    let mut timed_out = request(bucket);
    timed_out.options = RequestOptions::default()
        .retry(RetryMode::empty())
        .timeout_at(Instant::now() + Duration::from_secs(1));
    let err = queue.enqueue(timed_out).await.expect_err("over deadline");
    assert!(matches!(err, RequestError::Timeout));
}

// ============================================================================
// Global pause spans buckets and tasks
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_global_pause_halts_concurrent_unrelated_buckets() {
    let global_429 = TransportResponse {
        status: 429,
        rate: RateLimitHeaders {
            limit: None,
            remaining: None,
            reset_after: Some(3.0),
            bucket: None,
            global: true,
        },
        body: b"{}".to_vec(),
    };
    let transport = TimestampingTransport::new(vec![global_429]);
    let queue = RequestQueue::new(transport.clone(), LimiterConfig::default());

    let start = Instant::now();
    let mut offender = request(BucketId::endpoint("GET", "/a"));
    offender.options = RequestOptions::default().retry(RetryMode::empty());
    assert!(queue.enqueue(offender).await.is_err());

    // Three unrelated buckets, all held by the one global gate
    let mut handles = Vec::new();
    for route in ["/b", "/c", "/d"] {
        let queue = queue.clone();
        let bucket = BucketId::endpoint("GET", route);
        handles.push(tokio::spawn(async move {
            queue.enqueue(request(bucket)).await.expect("enqueue")
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let pause = Duration::from_secs(3) + LimiterConfig::default().clock_skew_lag();
    for at in transport.timestamps().iter().skip(1) {
        assert!(at.duration_since(start) >= pause);
    }
}
