//! Bucket table
//!
//! Concurrent map from [`BucketId`] to its quota bucket. A slot is either
//! an active bucket or a redirect to another id, so hash aliasing revealed
//! by the server at runtime is modeled without cyclic object graphs:
//! redirects indirect through the table and are resolved by following the
//! chain at send time.

use super::{static_definition, BucketId, RequestBucket, Window};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Redirect chains are short in practice (route -> hash); the cap only
/// guards against a corrupted table.
const MAX_REDIRECT_HOPS: usize = 8;

/// One slot in the bucket table
#[derive(Debug, Clone)]
pub enum BucketSlot {
    /// Active bucket owning its own counter
    Active(Arc<RequestBucket>),
    /// Future traffic for this id goes to another bucket
    Redirect(BucketId),
}

/// Concurrent table of quota buckets
///
/// Individual buckets are mutated under their own lock, never under the
/// table's, so unrelated endpoints are not serialized against each other.
#[derive(Debug, Default)]
pub struct BucketTable {
    slots: DashMap<BucketId, BucketSlot>,
}

impl BucketTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Resolve an id to its active bucket, following redirects
    ///
    /// Creates the bucket lazily on first use: static definitions seed
    /// their known window, everything else starts from the conservative
    /// window of one so at most one request is in flight until the first
    /// response teaches the bucket its real limits.
    pub fn resolve(&self, id: &BucketId) -> (BucketId, Arc<RequestBucket>) {
        let mut current = id.clone();
        let mut hops = 0;

        loop {
            if let Some(slot) = self.slots.get(&current) {
                match slot.value() {
                    BucketSlot::Active(bucket) => return (current.clone(), bucket.clone()),
                    BucketSlot::Redirect(next) => {
                        let next = next.clone();
                        drop(slot);
                        hops += 1;
                        if hops > MAX_REDIRECT_HOPS {
                            tracing::warn!(
                                bucket = %current,
                                "Redirect chain too long, breaking it"
                            );
                            break;
                        }
                        current = next;
                        continue;
                    }
                }
            }

            // Lazily create; entry() arbitrates concurrent first users
            let window = static_definition(&current).unwrap_or_else(Window::conservative);
            let entry = self
                .slots
                .entry(current.clone())
                .or_insert_with(|| BucketSlot::Active(Arc::new(RequestBucket::new(window))));
            if let BucketSlot::Active(bucket) = entry.value() {
                return (current.clone(), bucket.clone());
            }
            // Raced with a redirect insertion for the same id; follow it
        }

        // Chain break fallback: rebind the original id to a fresh bucket
        let window = static_definition(id).unwrap_or_else(Window::conservative);
        let bucket = Arc::new(RequestBucket::new(window));
        self.slots
            .insert(id.clone(), BucketSlot::Active(bucket.clone()));
        (id.clone(), bucket)
    }

    /// Apply a server-issued bucket hash to a route-keyed bucket
    ///
    /// Promotes the bucket to a hash identity when the hash is new, or
    /// redirects the route to the existing owner when another bucket
    /// already holds that hash. Converging decrements the target once to
    /// account for the ticket the in-flight request consumed from its old
    /// bucket.
    pub fn apply_hash(&self, route: &BucketId, bucket: &Arc<RequestBucket>, hash: &str) {
        if !route.is_promotable() {
            return;
        }

        let hash_id = BucketId::hash(hash);
        if hash_id == *route {
            return;
        }

        let existing = self.slots.get(&hash_id).and_then(|slot| match slot.value() {
            BucketSlot::Active(owner) => Some(owner.clone()),
            BucketSlot::Redirect(_) => None,
        });

        match existing {
            Some(owner) => {
                if Arc::ptr_eq(&owner, bucket) {
                    return;
                }
                owner.penalize();
                self.slots
                    .insert(route.clone(), BucketSlot::Redirect(hash_id.clone()));
                tracing::debug!(
                    route = %route,
                    hash = %hash_id,
                    "Route redirected into existing hash bucket"
                );
            }
            None => {
                self.slots
                    .insert(hash_id.clone(), BucketSlot::Active(bucket.clone()));
                self.slots
                    .insert(route.clone(), BucketSlot::Redirect(hash_id.clone()));
                tracing::debug!(
                    route = %route,
                    hash = %hash_id,
                    "Bucket promoted to hash identity"
                );
            }
        }
    }

    /// Evict buckets idle for longer than `idle`, plus redirects left
    /// dangling by an eviction
    pub fn sweep(&self, now: Instant, idle: Duration) {
        let before = self.slots.len();

        self.slots.retain(|_, slot| match slot {
            BucketSlot::Active(bucket) => now.saturating_duration_since(bucket.last_attempt()) <= idle,
            BucketSlot::Redirect(_) => true,
        });

        // Redirects whose target vanished are removed too; loop to clean
        // whole chains
        loop {
            let dangling: Vec<BucketId> = self
                .slots
                .iter()
                .filter_map(|entry| match entry.value() {
                    BucketSlot::Redirect(target) if !self.slots.contains_key(target) => {
                        Some(entry.key().clone())
                    }
                    _ => None,
                })
                .collect();
            if dangling.is_empty() {
                break;
            }
            for id in dangling {
                self.slots.remove(&id);
            }
        }

        let evicted = before - self.slots.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.slots.len(), "Swept idle buckets");
        }
    }

    /// Number of slots currently in the table
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
