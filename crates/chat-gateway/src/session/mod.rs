//! Gateway session state
//!
//! One [`GatewaySession`] holds the mutable state of one WebSocket
//! connection: its lifecycle state, the last received sequence, the
//! server-assigned session id, heartbeat accounting, and the cancellation
//! scope every task and in-flight send of this connection hangs off.
//! A hard reconnect replaces the session rather than mutating it across
//! identities; a resume keeps it.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection
    Disconnected,
    /// Socket opening, Hello not yet received
    Connecting,
    /// Hello received, heartbeat running
    Connected,
    /// Teardown in progress
    Disconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
        };
        f.write_str(name)
    }
}

/// State of one WebSocket connection
#[derive(Debug)]
pub struct GatewaySession {
    state: RwLock<ConnectionState>,
    /// Last sequence number received on an Event frame
    sequence: Mutex<Option<u64>>,
    /// Server-assigned session id, set by Hello
    session_id: RwLock<Option<String>>,
    /// When the last inbound frame of any kind arrived
    last_inbound: Mutex<Instant>,
    /// Send timestamps of heartbeats still awaiting their Pong
    outstanding: Mutex<VecDeque<Instant>>,
    /// One-shot latch so missed-heartbeat detection faults exactly once
    fault: AtomicBool,
    /// Cancellation scope for every task and send of this connection
    token: CancellationToken,
}

impl GatewaySession {
    /// Create a session in the Connecting state
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Connecting),
            sequence: Mutex::new(None),
            session_id: RwLock::new(None),
            last_inbound: Mutex::new(Instant::now()),
            outstanding: Mutex::new(VecDeque::new()),
            fault: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Set the connection state
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Last received sequence number
    pub fn sequence(&self) -> Option<u64> {
        *self.sequence.lock()
    }

    /// Record the sequence carried by an inbound Event frame
    pub fn observe_sequence(&self, sequence: u64) {
        *self.sequence.lock() = Some(sequence);
    }

    /// Server-assigned session id, once Hello arrived
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Store the session id from Hello
    pub fn set_session_id(&self, session_id: String) {
        *self.session_id.write() = Some(session_id);
    }

    /// Record an inbound frame of any kind
    pub fn record_inbound(&self, now: Instant) {
        *self.last_inbound.lock() = now;
    }

    /// Time since the last inbound frame
    pub fn time_since_inbound(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_inbound.lock())
    }

    /// Record a heartbeat send awaiting its Pong
    pub fn push_heartbeat(&self, sent_at: Instant) {
        self.outstanding.lock().push_back(sent_at);
    }

    /// Pop the oldest outstanding heartbeat send, if any
    pub fn pop_heartbeat(&self) -> Option<Instant> {
        self.outstanding.lock().pop_front()
    }

    /// Number of heartbeats still awaiting acknowledgement
    pub fn outstanding_heartbeats(&self) -> usize {
        self.outstanding.lock().len()
    }

    /// Drop all outstanding heartbeat sends (on teardown)
    pub fn drain_heartbeats(&self) {
        self.outstanding.lock().clear();
    }

    /// Trip the fault latch
    ///
    /// Returns `true` only for the first trip, so fault handling runs
    /// exactly once per session.
    pub fn trip_fault(&self) -> bool {
        !self.fault.swap(true, Ordering::SeqCst)
    }

    /// The connection-scoped cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for GatewaySession {
    fn default() -> Self {
        Self::new()
    }
}
