//! Channel object
//!
//! Message operations scoped to one channel. Range queries are served
//! from the bounded cache first; the channel computes the shortfall and
//! backfills it with a dispatcher-routed REST fetch, concatenating the
//! two pages in the requested order.

use crate::error::ClientError;
use crate::routes;
use chat_cache::{Direction, MessageCache};
use chat_core::{Message, Snowflake};
use chat_limiter::RequestQueue;
use std::sync::Arc;

/// Message operations for one channel
#[derive(Clone)]
pub struct MessageChannel {
    channel_id: Snowflake,
    queue: Arc<RequestQueue>,
    cache: Arc<MessageCache>,
}

impl MessageChannel {
    pub(crate) fn new(
        channel_id: Snowflake,
        queue: Arc<RequestQueue>,
        cache: Arc<MessageCache>,
    ) -> Self {
        Self {
            channel_id,
            queue,
            cache,
        }
    }

    /// The channel this object operates on
    #[must_use]
    pub fn id(&self) -> Snowflake {
        self.channel_id
    }

    /// Fetch up to `limit` messages relative to a reference
    ///
    /// Cache hits come first; a shortfall is downloaded through the
    /// dispatcher continuing past the last cached entry, so the combined
    /// page preserves the requested order. An `Around` query the cache
    /// cannot fully serve is downloaded whole instead of stitched.
    pub async fn messages(
        &self,
        reference: Option<Snowflake>,
        direction: Option<Direction>,
        limit: usize,
    ) -> Result<Vec<Message>, ClientError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut cached = self.cache.get_many(reference, direction, limit);
        if cached.len() >= limit {
            cached.truncate(limit);
            return Ok(cached);
        }
        let shortfall = limit - cached.len();
        tracing::debug!(
            channel_id = %self.channel_id,
            cached = cached.len(),
            shortfall,
            "Cache short of requested range, backfilling from REST"
        );

        let mut combined = match direction {
            Some(Direction::Around) => {
                // Stitching a partial around-window would reorder it;
                // download the whole window instead
                self.fetch(reference, Some(Direction::Around), limit).await?
            }
            Some(Direction::After) => {
                let anchor = cached.last().map(|m| m.id).or(reference);
                let page = self
                    .fetch(anchor, anchor.map(|_| Direction::After), shortfall)
                    .await?;
                cached.extend(page);
                cached
            }
            Some(Direction::Before) | None => {
                // Both walk backwards from the oldest thing we have
                let anchor = cached.last().map(|m| m.id).or(reference);
                let page = self
                    .fetch(anchor, anchor.map(|_| Direction::Before), shortfall)
                    .await?;
                cached.extend(page);
                cached
            }
        };

        combined.truncate(limit);
        Ok(combined)
    }

    /// Send a message to this channel
    pub async fn send(&self, content: &str) -> Result<Message, ClientError> {
        self.create(content, None).await
    }

    /// Send a reply referencing another message
    pub async fn reply(
        &self,
        reference: Snowflake,
        content: &str,
    ) -> Result<Message, ClientError> {
        self.create(content, Some(reference)).await
    }

    /// Edit a message in this channel
    pub async fn edit(
        &self,
        message_id: Snowflake,
        content: &str,
    ) -> Result<Message, ClientError> {
        let response = self
            .queue
            .enqueue(routes::edit_message(self.channel_id, message_id, content))
            .await?;
        let message: Message = response.json()?;
        self.cache.insert(message.clone());
        Ok(message)
    }

    /// Delete a message from this channel (and the cache)
    pub async fn delete(&self, message_id: Snowflake) -> Result<(), ClientError> {
        self.queue
            .enqueue(routes::delete_message(self.channel_id, message_id))
            .await?;
        self.cache.remove(message_id);
        Ok(())
    }

    /// Look up a message in the cache only, without I/O
    #[must_use]
    pub fn cached(&self, message_id: Snowflake) -> Option<Message> {
        self.cache.get(message_id)
    }

    async fn create(
        &self,
        content: &str,
        reference: Option<Snowflake>,
    ) -> Result<Message, ClientError> {
        let response = self
            .queue
            .enqueue(routes::create_message(self.channel_id, content, reference))
            .await?;
        let message: Message = response.json()?;
        self.cache.insert(message.clone());
        Ok(message)
    }

    async fn fetch(
        &self,
        reference: Option<Snowflake>,
        direction: Option<Direction>,
        limit: usize,
    ) -> Result<Vec<Message>, ClientError> {
        let response = self
            .queue
            .enqueue(routes::get_messages(
                self.channel_id,
                reference,
                direction,
                limit,
            ))
            .await?;
        let page: Vec<Message> = response.json()?;
        Ok(page)
    }
}

impl std::fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}
