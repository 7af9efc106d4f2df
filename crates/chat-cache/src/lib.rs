//! # chat-cache
//!
//! Bounded, insertion-ordered message cache. Serves recent-message range
//! queries from memory; callers compute any shortfall and backfill from
//! REST themselves - this crate performs no I/O.

pub mod messages;

// Re-export commonly used types at crate root
pub use messages::{Direction, MessageCache};
