//! Bounded message cache
//!
//! A concurrent id-to-message map plus a FIFO of (id, insertion time)
//! pairs bounding the map to a configured capacity. Eviction removes the
//! oldest FIFO entry and its map slot; explicit removals mutate both
//! structures under the FIFO lock so the map's key set always stays a
//! subset of the FIFO's id set.

use chat_core::{Message, Snowflake};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Directional range semantics relative to a reference message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Strictly older than the reference, newest-first
    Before,
    /// Strictly newer than the reference, oldest-first
    After,
    /// Half before and half after, spliced around the reference
    Around,
}

impl Direction {
    /// Query-parameter spelling of this direction
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Around => "around",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-capacity, insertion-ordered message cache
pub struct MessageCache {
    capacity: usize,
    entries: DashMap<Snowflake, Message>,
    order: Mutex<VecDeque<(Snowflake, DateTime<Utc>)>>,
}

impl MessageCache {
    /// Create a cache bounded to `capacity` messages
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Insert a message, evicting the oldest entries past capacity
    ///
    /// Inserting an id already present replaces the cached message in
    /// place (an edit) without touching its position in insertion order.
    pub fn insert(&self, message: Message) {
        let mut order = self.order.lock();

        let id = message.id;
        if self.entries.insert(id, message).is_none() {
            order.push_back((id, Utc::now()));
        }

        while order.len() > self.capacity {
            if let Some((evicted, _)) = order.pop_front() {
                self.entries.remove(&evicted);
                tracing::trace!(id = %evicted, "Evicted oldest cached message");
            }
        }
    }

    /// Remove a message from both structures
    pub fn remove(&self, id: Snowflake) -> Option<Message> {
        let mut order = self.order.lock();
        if let Some(position) = order.iter().position(|(entry, _)| *entry == id) {
            order.remove(position);
        }
        self.entries.remove(&id).map(|(_, message)| message)
    }

    /// Look up a message by id
    pub fn get(&self, id: Snowflake) -> Option<Message> {
        self.entries.get(&id).map(|entry| entry.clone())
    }

    /// Range query relative to a reference message
    ///
    /// - `Before`: strictly older entries, newest-first.
    /// - `After`: strictly newer entries, oldest-first.
    /// - `Around`: half the limit before and the rest after, spliced
    ///   newest-first around the reference; empty when the reference
    ///   itself is not cached.
    /// - no direction: the most recent `limit` entries, newest-first.
    ///
    /// When the reference is absent from the cache, `Before`/`After`
    /// degrade to all cached entries capped by `limit`. A `limit` of zero
    /// returns nothing.
    pub fn get_many(
        &self,
        reference: Option<Snowflake>,
        direction: Option<Direction>,
        limit: usize,
    ) -> Vec<Message> {
        if limit == 0 {
            return Vec::new();
        }
        let order = self.order.lock();

        match direction {
            None => self.collect(order.iter().rev().take(limit)),
            Some(Direction::Around) => {
                let Some(position) = reference.and_then(|id| Self::position(&order, id)) else {
                    return Vec::new();
                };
                self.around(&order, position, limit)
            }
            Some(Direction::Before) => {
                match reference.and_then(|id| Self::position(&order, id)) {
                    Some(position) => {
                        self.collect(order.iter().take(position).rev().take(limit))
                    }
                    None => self.collect(order.iter().rev().take(limit)),
                }
            }
            Some(Direction::After) => {
                match reference.and_then(|id| Self::position(&order, id)) {
                    Some(position) => {
                        self.collect(order.iter().skip(position + 1).take(limit))
                    }
                    None => self.collect(order.iter().take(limit)),
                }
            }
        }
    }

    /// Number of cached messages
    pub fn len(&self) -> usize {
        self.order.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.order.lock().is_empty()
    }

    /// Configured capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn position(order: &VecDeque<(Snowflake, DateTime<Utc>)>, id: Snowflake) -> Option<usize> {
        order.iter().position(|(entry, _)| *entry == id)
    }

    /// Splice `[after reversed, reference, before]`, newest-first overall
    fn around(
        &self,
        order: &VecDeque<(Snowflake, DateTime<Utc>)>,
        position: usize,
        limit: usize,
    ) -> Vec<Message> {
        let before_count = limit / 2;
        let after_count = limit - before_count - 1;

        let mut after: Vec<Message> =
            self.collect(order.iter().skip(position + 1).take(after_count));
        after.reverse();

        let mut result = after;
        result.extend(self.collect(order.iter().skip(position).take(1)));
        result.extend(self.collect(order.iter().take(position).rev().take(before_count)));
        result
    }

    fn collect<'a>(
        &self,
        ids: impl Iterator<Item = &'a (Snowflake, DateTime<Utc>)>,
    ) -> Vec<Message> {
        ids.filter_map(|(id, _)| self.entries.get(id).map(|entry| entry.clone()))
            .collect()
    }
}

impl std::fmt::Debug for MessageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
