//! Handler registry
//!
//! Ordered publish/subscribe list used for client-side notifications.
//! Handlers run synchronously in subscription order; a handler that needs
//! to do real work should hand off to its own task.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Boxed handler invoked on publish
type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Opaque token returned by [`HandlerRegistry::subscribe`]
///
/// Pass it back to [`HandlerRegistry::unsubscribe`] to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Get the raw handle id
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Ordered list of handlers for one notification type
///
/// Subscribing returns a [`SubscriptionHandle`]; publishing invokes every
/// live handler in the order they subscribed.
pub struct HandlerRegistry<T> {
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> HandlerRegistry<T> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler, returning its handle
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, Arc::new(handler)));
        SubscriptionHandle(id)
    }

    /// Remove a handler by handle
    ///
    /// Returns `true` if the handler was still registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != handle.0);
        handlers.len() != before
    }

    /// Invoke every handler in subscription order
    ///
    /// The handler list is snapshotted first so a handler may subscribe or
    /// unsubscribe without deadlocking the registry.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<Handler<T>> = self.handlers.read().iter().map(|(_, h)| h.clone()).collect();
        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Check if no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
