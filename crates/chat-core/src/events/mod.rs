//! Observer registry
//!
//! Plain publish/subscribe used for client-side notifications (rate-limit
//! telemetry, gateway lifecycle events). Handlers are invoked in
//! subscription order.

mod registry;

pub use registry::{HandlerRegistry, SubscriptionHandle};
