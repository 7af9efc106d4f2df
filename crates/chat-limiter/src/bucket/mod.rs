//! Bucket model
//!
//! A bucket is a named quota domain; all requests assigned the same
//! [`BucketId`] share one rate limit. Buckets are created lazily, taught
//! their real window by response headers, and swept when idle.

mod definitions;
mod id;
mod request_bucket;
mod table;

pub use definitions::{static_definition, Window};
pub use id::BucketId;
pub use request_bucket::{Admission, RequestBucket};
pub use table::{BucketSlot, BucketTable};
