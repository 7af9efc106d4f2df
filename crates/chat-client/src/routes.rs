//! REST route table
//!
//! Typed constructors for every REST call the SDK core issues. Each route
//! renders its path and assigns the bucket the request is admitted
//! through: write routes share the static `send-edit` client bucket,
//! reads get per-route endpoint buckets the server may later converge via
//! hash, and the gateway URL fetch rides the gateway bucket.

use chat_cache::Direction;
use chat_core::Snowflake;
use chat_limiter::{BucketId, Method, Request};

/// `GET /gateway/index` - where to open the WebSocket
#[must_use]
pub fn get_gateway() -> Request {
    Request::new(Method::Get, "/gateway/index").with_bucket(BucketId::Gateway)
}

/// `GET /users/@me` - the authenticated user
#[must_use]
pub fn get_current_user() -> Request {
    Request::new(Method::Get, "/users/@me").with_bucket(BucketId::endpoint("GET", "/users/@me"))
}

/// `GET /channels/{id}/messages` - a page of messages around a reference
#[must_use]
pub fn get_messages(
    channel_id: Snowflake,
    reference: Option<Snowflake>,
    direction: Option<Direction>,
    limit: usize,
) -> Request {
    let mut path = format!("/channels/{channel_id}/messages?limit={limit}");
    if let (Some(reference), Some(direction)) = (reference, direction) {
        path.push_str(&format!("&{direction}={reference}"));
    }

    Request::new(Method::Get, path)
        .with_bucket(BucketId::endpoint("GET", route_messages(channel_id)))
}

/// `POST /channels/{id}/messages` - send a message
#[must_use]
pub fn create_message(
    channel_id: Snowflake,
    content: &str,
    reference: Option<Snowflake>,
) -> Request {
    let mut body = serde_json::json!({ "content": content });
    if let Some(reference) = reference {
        body["reference_id"] = serde_json::json!(reference);
    }

    Request::new(Method::Post, format!("/channels/{channel_id}/messages"))
        .with_body(body)
        .with_bucket(BucketId::Client("send-edit"))
}

/// `PATCH /channels/{id}/messages/{id}` - edit a message
///
/// Shares the `send-edit` window with message creation.
#[must_use]
pub fn edit_message(channel_id: Snowflake, message_id: Snowflake, content: &str) -> Request {
    Request::new(
        Method::Patch,
        format!("/channels/{channel_id}/messages/{message_id}"),
    )
    .with_body(serde_json::json!({ "content": content }))
    .with_bucket(BucketId::Client("send-edit"))
}

/// `DELETE /channels/{id}/messages/{id}` - delete a message
#[must_use]
pub fn delete_message(channel_id: Snowflake, message_id: Snowflake) -> Request {
    Request::new(
        Method::Delete,
        format!("/channels/{channel_id}/messages/{message_id}"),
    )
    .with_bucket(BucketId::endpoint("DELETE", route_messages(channel_id)))
}

/// Bucket route template for a channel's message endpoints
fn route_messages(channel_id: Snowflake) -> String {
    format!("/channels/{channel_id}/messages")
}
