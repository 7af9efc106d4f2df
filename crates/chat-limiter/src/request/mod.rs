//! Request model
//!
//! What a caller hands the dispatcher: method, templated path, JSON body,
//! target bucket, retry flags, deadline, and a cancellation signal; plus
//! the response shape the transport hands back.

mod request;
mod response;

pub use request::{Method, Request, RequestOptions, RetryMode};
pub use response::{
    RateLimitHeaders, TransportResponse, HEADER_BUCKET, HEADER_GLOBAL, HEADER_LIMIT,
    HEADER_REMAINING, HEADER_RESET_AFTER,
};
