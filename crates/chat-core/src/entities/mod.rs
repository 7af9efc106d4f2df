//! Decoded entities
//!
//! Client-side views of server payloads. Only the types the network core
//! needs are modeled here; the wider entity catalogue lives with the
//! command/DTO layers outside this SDK core.

mod message;
mod user;

pub use message::Message;
pub use user::CurrentUser;
