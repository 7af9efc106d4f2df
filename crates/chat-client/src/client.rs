//! Client facade
//!
//! Owns the wiring: reqwest transport into the rate-limited dispatcher,
//! dispatcher into the gateway session manager, and gateway message
//! dispatches into the bounded cache.

use crate::channel::MessageChannel;
use crate::error::ClientError;
use crate::routes;
use crate::transport::RestTransport;
use chat_cache::MessageCache;
use chat_common::ClientConfig;
use chat_core::{CurrentUser, Message, Snowflake};
use chat_gateway::{
    ConnectionState, EventKind, EventSubscription, GatewayEvent, SessionManager,
};
use chat_limiter::{RateLimitEvent, RequestQueue};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Payload of a `MESSAGE_DELETE` dispatch
#[derive(Debug, Deserialize)]
struct MessageDeletePayload {
    id: Snowflake,
}

/// The chat platform client
///
/// One instance owns one dispatcher, one gateway session manager, and one
/// message cache; multiple instances coexist without shared state.
pub struct ChatClient {
    config: ClientConfig,
    queue: Arc<RequestQueue>,
    gateway: Arc<SessionManager>,
    cache: Arc<MessageCache>,
    _cache_feed: EventSubscription,
}

impl ChatClient {
    /// Build a client from environment variables
    ///
    /// # Errors
    /// Returns an error when required variables are missing or the HTTP
    /// client cannot be built.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Build a client from an explicit configuration
    ///
    /// Must be called from within a tokio runtime; the dispatcher starts
    /// its bucket sweep on construction.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(RestTransport::new(&config.rest, config.token.clone())?);
        Ok(Self::with_transport(config, transport))
    }

    /// Build a client on top of an explicit transport
    ///
    /// Everything above the transport seam is wired exactly as in
    /// [`Self::new`]; tests script the transport, embedders may swap in
    /// their own HTTP stack.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn chat_limiter::Transport>) -> Self {
        let queue = RequestQueue::new(transport, config.limiter.clone());
        let gateway =
            SessionManager::new(config.gateway.clone(), config.token.clone(), queue.clone());
        let cache = Arc::new(MessageCache::new(config.cache.message_capacity));
        let cache_feed = Self::feed_cache(&gateway, &cache);

        Self {
            config,
            queue,
            gateway,
            cache,
            _cache_feed: cache_feed,
        }
    }

    // === Gateway lifecycle ===

    /// Open the gateway connection
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.gateway.connect().await?;
        Ok(())
    }

    /// Close the gateway connection deliberately
    pub async fn disconnect(&self) {
        self.gateway.disconnect().await;
    }

    /// Current gateway connection state
    pub fn state(&self) -> ConnectionState {
        self.gateway.state()
    }

    /// Most recent measured heartbeat round-trip latency
    pub fn latency(&self) -> Option<Duration> {
        self.gateway.latency()
    }

    // === Subscriptions ===

    /// Register a handler for one gateway event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> EventSubscription
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.gateway.subscribe(kind, handler)
    }

    /// Remove a gateway subscription
    pub fn unsubscribe(&self, subscription: EventSubscription) -> bool {
        self.gateway.unsubscribe(subscription)
    }

    /// Register a handler for rate-limit telemetry
    pub fn on_rate_limit<F>(&self, handler: F) -> chat_core::SubscriptionHandle
    where
        F: Fn(&RateLimitEvent) + Send + Sync + 'static,
    {
        self.queue.on_rate_limit(handler)
    }

    // === REST surface ===

    /// A channel object for message operations
    #[must_use]
    pub fn channel(&self, channel_id: Snowflake) -> MessageChannel {
        MessageChannel::new(channel_id, self.queue.clone(), self.cache.clone())
    }

    /// Fetch the authenticated user
    pub async fn current_user(&self) -> Result<CurrentUser, ClientError> {
        let response = self.queue.enqueue(routes::get_current_user()).await?;
        let user: CurrentUser = response.json()?;
        Ok(user)
    }

    // === Plumbing access (entity/command layers build on these) ===

    /// The dispatcher every outbound call rides through
    #[must_use]
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// The gateway session manager
    #[must_use]
    pub fn gateway(&self) -> &Arc<SessionManager> {
        &self.gateway
    }

    /// The bounded message cache
    #[must_use]
    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    /// The configuration this client was built from
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Feed message dispatches into the cache
    ///
    /// Create and update upsert; delete removes from both cache
    /// structures. Payloads that fail to decode are dropped with a
    /// warning so one malformed event cannot poison the cache.
    fn feed_cache(gateway: &Arc<SessionManager>, cache: &Arc<MessageCache>) -> EventSubscription {
        let cache = cache.clone();
        gateway.subscribe(EventKind::Dispatch, move |event| {
            let GatewayEvent::Dispatch { event, data, .. } = event else {
                return;
            };
            match event.as_str() {
                "MESSAGE_CREATE" | "MESSAGE_UPDATE" => {
                    match serde_json::from_value::<Message>(data.clone()) {
                        Ok(message) => cache.insert(message),
                        Err(err) => {
                            tracing::warn!(error = %err, event = %event, "Dropping undecodable message dispatch");
                        }
                    }
                }
                "MESSAGE_DELETE" => {
                    match serde_json::from_value::<MessageDeletePayload>(data.clone()) {
                        Ok(payload) => {
                            cache.remove(payload.id);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "Dropping undecodable delete dispatch");
                        }
                    }
                }
                _ => {}
            }
        })
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("state", &self.state())
            .field("cached_messages", &self.cache.len())
            .finish()
    }
}
