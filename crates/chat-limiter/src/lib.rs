//! # chat-limiter
//!
//! Rate-limited request dispatcher. Every outbound REST call and gateway
//! frame passes through a [`RequestQueue`], which resolves the request's
//! [`BucketId`] to a quota bucket, enforces admission, honors the
//! process-wide global pause, and absorbs 429 responses without dropping
//! or duplicating requests.

pub mod bucket;
pub mod error;
pub mod events;
pub mod queue;
pub mod request;
pub mod transport;

// Re-export commonly used types at crate root
pub use bucket::{static_definition, BucketId, BucketSlot, BucketTable, RequestBucket, Window};
pub use error::RequestError;
pub use events::{RateLimitEvent, RateLimitInfo};
pub use queue::RequestQueue;
pub use request::{
    Method, RateLimitHeaders, Request, RequestOptions, RetryMode, TransportResponse,
};
pub use transport::{Transport, TransportError};
