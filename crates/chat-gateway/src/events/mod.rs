//! Gateway event bus
//!
//! Publish/subscribe registry for everything the session manager surfaces
//! to the application: decoded event dispatches and connection lifecycle
//! notifications.

use crate::protocol::CloseCode;
use chat_core::events::{HandlerRegistry, SubscriptionHandle};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Kind of gateway event, used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A server event dispatch (`MESSAGE_CREATE`, ...)
    Dispatch,
    /// The session reached Connected after Hello
    Connected,
    /// The server accepted a resume request
    Resumed,
    /// The session reached Disconnected, deliberately or by fault
    Disconnected,
    /// A Pong updated the measured round-trip latency
    LatencyUpdated,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Deliberate local disconnect
    Requested,
    /// The server sent a Reconnect frame
    ReconnectRequested,
    /// Missed-heartbeat detection fired
    HeartbeatTimeout,
    /// The server closed the socket
    ServerClosed(Option<CloseCode>),
    /// The socket died underneath us
    TransportError(String),
}

impl DisconnectReason {
    /// Check if reconnecting is worth attempting after this reason
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        match self {
            Self::Requested => false,
            Self::ReconnectRequested | Self::HeartbeatTimeout | Self::TransportError(_) => true,
            Self::ServerClosed(code) => code.is_none_or(CloseCode::should_reconnect),
        }
    }

    /// Check if the prior session is still resumable after this reason
    #[must_use]
    pub fn should_resume(&self) -> bool {
        match self {
            Self::Requested => false,
            // The server asked for a plain reconnect; the session survives
            Self::ReconnectRequested | Self::HeartbeatTimeout | Self::TransportError(_) => true,
            Self::ServerClosed(code) => code.is_some_and(CloseCode::should_resume),
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::ReconnectRequested => write!(f, "reconnect requested by server"),
            Self::HeartbeatTimeout => write!(f, "heartbeat timeout"),
            Self::ServerClosed(Some(code)) => write!(f, "server closed: {code}"),
            Self::ServerClosed(None) => write!(f, "server closed"),
            Self::TransportError(err) => write!(f, "transport error: {err}"),
        }
    }
}

/// One gateway event delivered to subscribers
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Decoded server dispatch, forwarded with its payload untouched
    Dispatch {
        event: String,
        sequence: Option<u64>,
        data: Value,
    },
    Connected {
        session_id: String,
    },
    Resumed {
        session_id: String,
    },
    Disconnected {
        reason: DisconnectReason,
    },
    LatencyUpdated {
        previous: Option<Duration>,
        current: Duration,
    },
}

impl GatewayEvent {
    /// The subscription key this event publishes under
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Dispatch { .. } => EventKind::Dispatch,
            Self::Connected { .. } => EventKind::Connected,
            Self::Resumed { .. } => EventKind::Resumed,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::LatencyUpdated { .. } => EventKind::LatencyUpdated,
        }
    }
}

/// Subscription token returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSubscription {
    kind: EventKind,
    handle: SubscriptionHandle,
}

/// Ordered handler registry per event kind
#[derive(Debug, Default)]
pub struct EventBus {
    registries: DashMap<EventKind, Arc<HandlerRegistry<GatewayEvent>>>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> EventSubscription
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        let registry = Arc::clone(
            self.registries
                .entry(kind)
                .or_insert_with(|| Arc::new(HandlerRegistry::new()))
                .value(),
        );
        EventSubscription {
            kind,
            handle: registry.subscribe(handler),
        }
    }

    /// Remove a subscription
    ///
    /// Returns `true` if the handler was still registered.
    pub fn unsubscribe(&self, subscription: EventSubscription) -> bool {
        self.registries
            .get(&subscription.kind)
            .is_some_and(|registry| registry.unsubscribe(subscription.handle))
    }

    /// Deliver an event to every handler subscribed to its kind
    pub fn publish(&self, event: &GatewayEvent) {
        let registry = self
            .registries
            .get(&event.kind())
            .map(|entry| Arc::clone(entry.value()));
        if let Some(registry) = registry {
            registry.publish(event);
        }
    }

    /// Number of handlers subscribed to a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registries
            .get(&kind)
            .map_or(0, |registry| registry.len())
    }
}
