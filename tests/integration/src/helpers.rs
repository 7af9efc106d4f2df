//! Test helpers for integration tests
//!
//! Provides an in-process WebSocket gateway server with scriptable
//! behaviors, a scripted REST transport, an event recorder, and polling
//! utilities.

use async_trait::async_trait;
use chat_common::GatewayConfig;
use chat_gateway::{EventKind, FrameType, GatewayEvent, GatewayFrame, SessionManager};
use chat_limiter::{
    RateLimitHeaders, Request, RequestQueue, Transport, TransportError, TransportResponse,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

// ============================================================================
// Scripted REST transport
// ============================================================================

/// Transport that replays a scripted list of outcomes and records every
/// request path it executed
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    pub paths: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Script a fixed sequence; once exhausted, empty 200s are returned
    pub fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            paths: Mutex::new(Vec::new()),
        })
    }

    /// Number of requests that reached the transport
    pub fn executed(&self) -> usize {
        self.paths.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        self.paths.lock().push(request.path.clone());
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(TransportResponse {
                status: 200,
                rate: RateLimitHeaders::default(),
                body: b"{}".to_vec(),
            })
        })
    }
}

/// A 200 response with the given rate headers and JSON body
pub fn ok_response(rate: RateLimitHeaders, body: serde_json::Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        rate,
        body: serde_json::to_vec(&body).expect("serialize test body"),
    }
}

/// A non-2xx response
pub fn status_response(status: u16, rate: RateLimitHeaders, body: &[u8]) -> TransportResponse {
    TransportResponse {
        status,
        rate,
        body: body.to_vec(),
    }
}

// ============================================================================
// In-process gateway server
// ============================================================================

/// How a [`TestGateway`] connection behaves after the handshake
#[derive(Debug, Clone)]
pub enum ServerBehavior {
    /// Hello, answer every Ping with a Pong, send scripted events
    Normal {
        /// `(sequence, event envelope)` pairs sent right after Hello
        events: Vec<(u64, serde_json::Value)>,
    },
    /// Hello, then read frames without ever responding
    SilentAfterHello,
    /// Hello, then ask the client to reconnect
    ReconnectAfterHello,
    /// Never send Hello; swallow inbound frames
    NoHello,
}

impl ServerBehavior {
    /// Plain well-behaved gateway with no scripted events
    pub fn normal() -> Self {
        Self::Normal { events: Vec::new() }
    }
}

/// What the test gateway observed across all connections
#[derive(Debug, Default)]
pub struct GatewayObservations {
    /// Connect URIs in accept order (queries carry token/resume params)
    pub uris: Mutex<Vec<String>>,
    /// Inbound frames in arrival order
    pub frames: Mutex<Vec<GatewayFrame>>,
    /// Close codes received from the client
    pub close_codes: Mutex<Vec<u16>>,
    /// Number of accepted connections
    pub connections: AtomicUsize,
}

impl GatewayObservations {
    /// Inbound frames of one type
    pub fn frames_of(&self, frame_type: FrameType) -> usize {
        self.frames.lock().iter().filter(|f| f.s == frame_type).count()
    }
}

/// In-process WebSocket gateway accepting any number of connections
pub struct TestGateway {
    pub url: String,
    pub observed: Arc<GatewayObservations>,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    /// Bind on a free port and serve connections with the given behavior
    pub async fn spawn(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test gateway");
        let addr = listener.local_addr().expect("local addr");
        let observed = Arc::new(GatewayObservations::default());

        let server_observed = observed.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let connection = server_observed.connections.fetch_add(1, Ordering::SeqCst) + 1;

                let uris = server_observed.clone();
                let callback = move |request: &HandshakeRequest,
                                     response: HandshakeResponse|
                      -> Result<HandshakeResponse, ErrorResponse> {
                    uris.uris.lock().push(request.uri().to_string());
                    Ok(response)
                };

                let Ok(ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
                    continue;
                };
                serve_connection(behavior.clone(), ws, server_observed.clone(), connection).await;
            }
        });

        Self {
            url: format!("ws://{addr}/ws"),
            observed,
            _handle: handle,
        }
    }
}

async fn serve_connection(
    behavior: ServerBehavior,
    mut ws: WebSocketStream<TcpStream>,
    observed: Arc<GatewayObservations>,
    connection: usize,
) {
    if matches!(behavior, ServerBehavior::NoHello) {
        while let Some(Ok(_)) = ws.next().await {}
        return;
    }

    let session_id = format!("sess-{connection}");
    let resumed = observed
        .uris
        .lock()
        .last()
        .is_some_and(|uri| uri.contains("resume=1"));

    let hello = GatewayFrame {
        s: FrameType::Hello,
        sn: None,
        d: Some(serde_json::json!({ "session_id": session_id })),
    };
    if send_frame(&mut ws, &hello).await.is_err() {
        return;
    }

    if resumed {
        let ack = GatewayFrame {
            s: FrameType::ResumeAck,
            sn: None,
            d: Some(serde_json::json!({ "session_id": session_id })),
        };
        if send_frame(&mut ws, &ack).await.is_err() {
            return;
        }
    }

    if let ServerBehavior::Normal { events } = &behavior {
        for (sequence, data) in events {
            let frame = GatewayFrame {
                s: FrameType::Event,
                sn: Some(*sequence),
                d: Some(data.clone()),
            };
            if send_frame(&mut ws, &frame).await.is_err() {
                return;
            }
        }
    }

    if matches!(behavior, ServerBehavior::ReconnectAfterHello) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reconnect = GatewayFrame {
            s: FrameType::Reconnect,
            sn: None,
            d: None,
        };
        if send_frame(&mut ws, &reconnect).await.is_err() {
            return;
        }
    }

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let Ok(frame) = GatewayFrame::from_json(&text) else {
                    continue;
                };
                let is_ping = frame.s == FrameType::Ping;
                observed.frames.lock().push(frame);

                if is_ping && matches!(behavior, ServerBehavior::Normal { .. }) {
                    let pong = GatewayFrame {
                        s: FrameType::Pong,
                        sn: None,
                        d: None,
                    };
                    if send_frame(&mut ws, &pong).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    observed.close_codes.lock().push(u16::from(frame.code));
                }
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

async fn send_frame(
    ws: &mut WebSocketStream<TcpStream>,
    frame: &GatewayFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    ws.send(Message::Text(frame.to_json().expect("serialize test frame")))
        .await
}

// ============================================================================
// Session manager wiring
// ============================================================================

/// A session manager pointed at a test gateway, with a scripted REST
/// transport behind its dispatcher
pub fn test_manager(gateway_url: &str, heartbeat_interval_ms: u64) -> Arc<SessionManager> {
    let config = GatewayConfig {
        url: Some(gateway_url.to_string()),
        heartbeat_interval_ms,
        hello_timeout_ms: 1_000,
    };
    let queue = RequestQueue::new(
        ScriptedTransport::new(Vec::new()),
        chat_common::LimiterConfig::default(),
    );
    SessionManager::new(config, "test-token".to_string(), queue)
}

// ============================================================================
// Event recording
// ============================================================================

/// Records every event of the kinds it was attached to
#[derive(Default)]
pub struct EventRecorder {
    pub events: Arc<Mutex<Vec<GatewayEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this recorder to one event kind
    pub fn attach(&self, manager: &Arc<SessionManager>, kind: EventKind) {
        let sink = self.events.clone();
        manager.subscribe(kind, move |event| {
            sink.lock().push(event.clone());
        });
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn snapshot(&self) -> Vec<GatewayEvent> {
        self.events.lock().clone()
    }
}

// ============================================================================
// Polling
// ============================================================================

/// Await a condition, polling every 10 ms up to `timeout`
///
/// Panics with the given label when the deadline passes, so hung tests
/// fail with a readable message instead of a test-harness timeout.
pub async fn wait_for(label: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {label}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
