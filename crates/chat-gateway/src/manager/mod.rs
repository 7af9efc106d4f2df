//! Gateway session manager
//!
//! Connection state machine: connect, Hello, heartbeat, pong accounting,
//! reconnect-on-fault, deliberate disconnect, and the resume entry points.
//! Transitions are serialized by a lifecycle mutex so overlapping connect
//! and disconnect calls cannot race. The manager owns three tasks per
//! connection: a reader, an mpsc-fed writer, and the heartbeat loop, all
//! scoped to the session's cancellation token.

use crate::error::GatewayError;
use crate::events::{DisconnectReason, EventBus, EventKind, EventSubscription, GatewayEvent};
use crate::protocol::{
    CloseCode, FrameType, GatewayFrame, GatewayInfo, HelloPayload, NORMAL_CLOSE, RECONNECT_CLOSE,
};
use crate::session::{ConnectionState, GatewaySession};
use chat_common::GatewayConfig;
use chat_limiter::{BucketId, Method, Request, RequestError, RequestOptions, RequestQueue};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Session id and sequence a caller supplied for the next connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    pub session_id: String,
    pub sequence: u64,
}

/// The WebSocket connection state machine
///
/// One manager drives at most one live [`GatewaySession`] at a time. A
/// hard reconnect replaces the session; resume keeps its identity on the
/// server side and is requested via query parameters on the next connect.
pub struct SessionManager {
    config: GatewayConfig,
    auth_token: String,
    queue: Arc<RequestQueue>,
    events: EventBus,
    /// Serializes connect/disconnect transitions
    lifecycle: tokio::sync::Mutex<()>,
    session: RwLock<Option<Arc<GatewaySession>>>,
    writer: Mutex<Option<mpsc::Sender<Message>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    resume: Mutex<Option<ResumeState>>,
    /// Snapshot of the torn-down session, for reconnect-policy callers
    /// deciding resume-vs-fresh after the fact
    last_session: Mutex<Option<ResumeState>>,
    latency: Mutex<Option<Duration>>,
}

impl SessionManager {
    /// Create a manager; no connection is opened until [`Self::connect`]
    #[must_use]
    pub fn new(config: GatewayConfig, auth_token: String, queue: Arc<RequestQueue>) -> Arc<Self> {
        Arc::new(Self {
            config,
            auth_token,
            queue,
            events: EventBus::new(),
            lifecycle: tokio::sync::Mutex::new(()),
            session: RwLock::new(None),
            writer: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            resume: Mutex::new(None),
            last_session: Mutex::new(None),
            latency: Mutex::new(None),
        })
    }

    // === Lifecycle ===

    /// Open the gateway connection
    ///
    /// Fetches a gateway URL (unless one is configured), opens the socket,
    /// waits for Hello, and starts the heartbeat loop. Any failure before
    /// Hello completes is fatal for this attempt and propagated; the
    /// caller decides whether to call `connect` again.
    pub async fn connect(self: &Arc<Self>) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        if let Some(existing) = self.session.read().clone() {
            return Err(GatewayError::InvalidState(existing.state()));
        }

        let session = Arc::new(GatewaySession::new());
        *self.session.write() = Some(session.clone());
        tracing::info!("Connecting to gateway");

        match self.establish(&session).await {
            Ok(session_id) => {
                session.set_state(ConnectionState::Connected);
                tracing::info!(session_id = %session_id, "Gateway connected");
                self.events.publish(&GatewayEvent::Connected { session_id });
                Ok(())
            }
            Err(err) => {
                session.token().cancel();
                self.join_tasks().await;
                *self.writer.lock() = None;
                session.set_state(ConnectionState::Disconnected);
                *self.session.write() = None;
                tracing::error!(error = %err, "Gateway connect failed");
                Err(err)
            }
        }
    }

    /// Close the connection deliberately
    ///
    /// Idempotent; a manager with no live session does nothing.
    pub async fn disconnect(&self) {
        let session = self.session.read().clone();
        let Some(session) = session else { return };
        self.teardown(&session, DisconnectReason::Requested).await;
    }

    // === Resume entry points ===

    /// Request a resume on the next connect
    ///
    /// The manager itself never decides resume-vs-fresh; that policy
    /// belongs to the reconnect-policy caller.
    pub fn set_resume(&self, session_id: String, sequence: u64) {
        *self.resume.lock() = Some(ResumeState {
            session_id,
            sequence,
        });
    }

    /// Force a fresh identify on the next connect
    pub fn clear_resume(&self) {
        *self.resume.lock() = None;
    }

    /// The resume state currently armed, if any
    pub fn resume_state(&self) -> Option<ResumeState> {
        self.resume.lock().clone()
    }

    /// Id and sequence of the most recently torn-down session
    ///
    /// What a reconnect-policy caller feeds back into [`Self::set_resume`]
    /// when the disconnect reason allows resuming.
    pub fn last_session(&self) -> Option<ResumeState> {
        self.last_session.lock().clone()
    }

    // === Observers ===

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.session
            .read()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |session| session.state())
    }

    /// Server-assigned id of the live session, if connected
    pub fn session_id(&self) -> Option<String> {
        self.session.read().as_ref().and_then(|s| s.session_id())
    }

    /// Last received sequence number
    pub fn sequence(&self) -> Option<u64> {
        self.session.read().as_ref().and_then(|s| s.sequence())
    }

    /// Most recent measured heartbeat round-trip latency
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> EventSubscription
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, subscription: EventSubscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    // === Internals ===

    async fn establish(self: &Arc<Self>, session: &Arc<GatewaySession>) -> Result<String, GatewayError> {
        let options = RequestOptions::default().with_cancellation(session.token().clone());

        // Connect attempts share the static identify window
        self.queue
            .throttle(&BucketId::Client("identify"), &options)
            .await?;

        let base = match &self.config.url {
            Some(url) => url.clone(),
            None => self.fetch_gateway_url(&options).await?,
        };
        let url = self.connect_url(&base);

        let (stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|err| GatewayError::Connect(err.to_string()))?;
        let (sink, stream) = stream.split();

        let (writer_tx, writer_rx) = mpsc::channel::<Message>(64);
        *self.writer.lock() = Some(writer_tx.clone());

        let (hello_tx, hello_rx) = oneshot::channel::<HelloPayload>();

        {
            let mut tasks = self.tasks.lock();
            tasks.push(tokio::spawn(write_loop(
                sink,
                writer_rx,
                session.token().clone(),
            )));
            tasks.push(tokio::spawn(read_loop(
                stream,
                session.clone(),
                Arc::downgrade(self),
                hello_tx,
            )));
        }

        // The server dictates cadence only after Hello, so the heartbeat
        // loop starts from here, not from socket-open
        let hello = tokio::time::timeout(self.config.hello_timeout(), hello_rx)
            .await
            .map_err(|_| GatewayError::HelloTimeout(self.config.hello_timeout()))?
            .map_err(|_| GatewayError::Connect("socket closed before Hello".to_string()))?;

        session.set_session_id(hello.session_id.clone());
        session.record_inbound(Instant::now());

        self.tasks.lock().push(tokio::spawn(heartbeat_loop(
            Arc::downgrade(self),
            session.clone(),
            self.queue.clone(),
            writer_tx,
            self.config.heartbeat_interval(),
        )));

        Ok(hello.session_id)
    }

    async fn fetch_gateway_url(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        let request = Request::new(Method::Get, "/gateway/index")
            .with_bucket(BucketId::Gateway)
            .with_options(options.clone());
        let response = self.queue.enqueue(request).await?;
        let info: GatewayInfo = response.json()?;
        Ok(info.url)
    }

    fn connect_url(&self, base: &str) -> String {
        let sep = if base.contains('?') { '&' } else { '?' };
        let mut url = format!("{base}{sep}token={}", self.auth_token);
        if let Some(resume) = self.resume.lock().clone() {
            url.push_str(&format!(
                "&resume=1&session_id={}&sn={}",
                resume.session_id, resume.sequence
            ));
        }
        url
    }

    /// Trip the session's fault latch and tear down in the background
    ///
    /// The latch guarantees fault handling runs exactly once per session
    /// no matter how many detection paths fire.
    fn fault(self: &Arc<Self>, session: &Arc<GatewaySession>, reason: DisconnectReason) {
        if !session.trip_fault() {
            return;
        }
        tracing::warn!(reason = %reason, "Gateway session fault");

        let manager = self.clone();
        let session = session.clone();
        tokio::spawn(async move {
            manager.teardown(&session, reason).await;
        });
    }

    async fn teardown(&self, target: &Arc<GatewaySession>, reason: DisconnectReason) {
        let _guard = self.lifecycle.lock().await;

        // Only tear down the session that faulted; a newer one stays up
        let current = self.session.read().clone();
        let Some(current) = current else { return };
        if !Arc::ptr_eq(&current, target) || current.state() == ConnectionState::Disconnected {
            return;
        }

        current.set_state(ConnectionState::Disconnecting);

        // A reconnect handoff closes with a distinct code so the server
        // can tell deliberate reconnects from faults
        let code = if reason == DisconnectReason::Requested {
            NORMAL_CLOSE
        } else {
            RECONNECT_CLOSE
        };
        let writer = self.writer.lock().clone();
        if let Some(writer) = writer {
            let frame = CloseFrame {
                code: code.into(),
                reason: "".into(),
            };
            let _ = writer.send(Message::Close(Some(frame))).await;
        }

        current.token().cancel();
        self.join_tasks().await;

        current.drain_heartbeats();
        current.set_state(ConnectionState::Disconnected);
        if let Some(session_id) = current.session_id() {
            *self.last_session.lock() = Some(ResumeState {
                session_id,
                sequence: current.sequence().unwrap_or(0),
            });
        }
        *self.writer.lock() = None;
        *self.session.write() = None;

        tracing::info!(reason = %reason, "Gateway session closed");
        self.events.publish(&GatewayEvent::Disconnected { reason });
    }

    async fn join_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    fn handle_frame(
        self: &Arc<Self>,
        session: &Arc<GatewaySession>,
        text: &str,
        hello_tx: &mut Option<oneshot::Sender<HelloPayload>>,
    ) {
        let frame = match GatewayFrame::from_json(text) {
            Ok(frame) => frame,
            Err(err) => {
                // Subscribers never see partial frames
                tracing::warn!(error = %err, "Dropping undecodable frame");
                return;
            }
        };

        match frame.s {
            FrameType::Hello => match frame.as_hello() {
                Some(hello) => {
                    if let Some(tx) = hello_tx.take() {
                        let _ = tx.send(hello);
                    }
                }
                None => tracing::warn!("Hello frame without a session id"),
            },
            FrameType::Event => {
                if let Some(sequence) = frame.sn {
                    session.observe_sequence(sequence);
                }
                if let Some(envelope) = frame.as_event() {
                    self.events.publish(&GatewayEvent::Dispatch {
                        event: envelope.event,
                        sequence: frame.sn,
                        data: envelope.data,
                    });
                }
            }
            FrameType::Pong => {
                if let Some(sent) = session.pop_heartbeat() {
                    let current = Instant::now().saturating_duration_since(sent);
                    let previous = self.latency.lock().replace(current);
                    tracing::trace!(latency_ms = current.as_millis() as u64, "Pong received");
                    self.events
                        .publish(&GatewayEvent::LatencyUpdated { previous, current });
                }
            }
            FrameType::Ping => {
                // Server-initiated liveness probe; answer in place
                let writer = self.writer.lock().clone();
                if let Some(writer) = writer {
                    let pong = GatewayFrame {
                        s: FrameType::Pong,
                        sn: session.sequence(),
                        d: None,
                    };
                    if let Ok(json) = pong.to_json() {
                        let _ = writer.try_send(Message::Text(json));
                    }
                }
            }
            FrameType::Reconnect => {
                tracing::info!("Server requested reconnect");
                self.fault(session, DisconnectReason::ReconnectRequested);
            }
            FrameType::ResumeAck => {
                if let Some(ack) = frame.as_resume_ack() {
                    tracing::info!(session_id = %ack.session_id, "Resume acknowledged");
                    self.events.publish(&GatewayEvent::Resumed {
                        session_id: ack.session_id,
                    });
                }
            }
            FrameType::Resume => {}
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish()
    }
}

/// Forward queued messages to the socket until cancelled
///
/// A close frame terminates the loop after it is flushed, so the close
/// code reaches the server before the sink drops.
async fn write_loop(mut sink: WsSink, mut rx: mpsc::Receiver<Message>, token: tokio_util::sync::CancellationToken) {
    loop {
        tokio::select! {
            biased;
            maybe = rx.recv() => match maybe {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() {
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => break,
            },
            () = token.cancelled() => {
                // Flush anything already queued; the close frame rides here
                while let Ok(message) = rx.try_recv() {
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() {
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                break;
            }
        }
    }
    let _ = sink.close().await;
}

/// Decode inbound frames in arrival order on a single consumer
async fn read_loop(
    mut stream: WsStream,
    session: Arc<GatewaySession>,
    manager: Weak<SessionManager>,
    hello_tx: oneshot::Sender<HelloPayload>,
) {
    let token = session.token().clone();
    let mut hello_tx = Some(hello_tx);

    loop {
        let message = tokio::select! {
            () = token.cancelled() => break,
            message = stream.next() => message,
        };
        let Some(manager) = manager.upgrade() else { break };

        match message {
            Some(Ok(Message::Text(text))) => {
                session.record_inbound(Instant::now());
                manager.handle_frame(&session, &text, &mut hello_tx);
            }
            Some(Ok(Message::Close(frame))) => {
                let code = frame.and_then(|f| CloseCode::from_u16(u16::from(f.code)));
                manager.fault(&session, DisconnectReason::ServerClosed(code));
                break;
            }
            Some(Ok(_)) => {
                // Binary and WS-level ping/pong carry nothing for us
            }
            Some(Err(err)) => {
                manager.fault(&session, DisconnectReason::TransportError(err.to_string()));
                break;
            }
            None => {
                manager.fault(
                    &session,
                    DisconnectReason::TransportError("connection closed".to_string()),
                );
                break;
            }
        }
    }
}

/// Heartbeat loop; runs until the session's token is cancelled
///
/// Each tick first checks for a zombie connection: a ping in flight
/// unanswered while the server has been silent for more than one interval
/// forces exactly one error-triggered reconnect through the fault latch.
/// The interval before the first ping is a grace period. Send failures
/// are logged and skipped for that tick; a single dropped heartbeat never
/// tears down the session.
async fn heartbeat_loop(
    manager: Weak<SessionManager>,
    session: Arc<GatewaySession>,
    queue: Arc<RequestQueue>,
    writer: mpsc::Sender<Message>,
    interval: Duration,
) {
    let token = session.token().clone();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut sent_any = false;

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if session.state() != ConnectionState::Connected {
            continue;
        }

        let now = Instant::now();
        if sent_any
            && session.outstanding_heartbeats() > 0
            && session.time_since_inbound(now) > interval
        {
            if let Some(manager) = manager.upgrade() {
                manager.fault(&session, DisconnectReason::HeartbeatTimeout);
            }
            break;
        }

        // Gateway frames share admission with REST through the gateway
        // bucket
        let options = RequestOptions::default().with_cancellation(token.clone());
        if let Err(err) = queue.throttle(&BucketId::Gateway, &options).await {
            if matches!(err, RequestError::Cancelled) {
                break;
            }
            tracing::warn!(error = %err, "Heartbeat skipped: admission failed");
            continue;
        }

        let frame = GatewayFrame::ping(session.sequence());
        match frame.to_json() {
            Ok(json) => {
                if writer.send(Message::Text(json)).await.is_ok() {
                    session.push_heartbeat(Instant::now());
                    sent_any = true;
                } else {
                    tracing::warn!("Heartbeat skipped: writer closed");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Heartbeat skipped: encode failed"),
        }
    }
}
