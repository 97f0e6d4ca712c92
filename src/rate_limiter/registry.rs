//! # Bucket Registry
//!
//! Concurrent map from client identifier to that client's bucket, bounded in
//! size and swept periodically for idle entries.
//!
//! ```text
//!     user:9f86d0… ──┐
//!     ip:10.0.0.1 ───┤          ┌──────────────────────────┐
//!     ip:10.0.0.2 ───┼──► get ─►│ DashMap (sharded)        │
//!     user:2c26b4… ──┤          │  id → Arc<BucketEntry>   │
//!     ip:unknown ────┘          │  id → Arc<BucketEntry>   │
//!                               └──────────────────────────┘
//!                                        │ clone Arc, drop shard guard
//!                                        ▼
//!                               bucket.consume() under the
//!                               bucket's own mutex
//! ```
//!
//! ## Key Properties
//!
//! 1. **Bounded Memory**: creation for an unseen client fails once
//!    `max_buckets` entries exist; existing clients keep being served.
//! 2. **Exact Bound**: the live count is reserved atomically before insert and
//!    rolled back on a lost race, so concurrent creators cannot overshoot.
//! 3. **Fine-grained Locking**: a shard guard is never held while a shared
//!    bucket is locked. The one exception is the bucket `make` builds for an
//!    unseen client, which no other thread can reach until it is inserted.
//! 4. **Safe Eviction**: removal is atomic with respect to lookups. A request
//!    that already cloned an evicted entry finishes on it; the next request
//!    starts a fresh bucket.

use super::core::TokenBucket;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A tracked client: its bucket plus when it was last seen.
#[derive(Debug)]
pub struct BucketEntry {
    bucket: TokenBucket,
    last_seen_ms: AtomicU64,
}

impl BucketEntry {
    /// Wraps a bucket, stamping it as seen at `now_ms`.
    pub fn new(bucket: TokenBucket, now_ms: u64) -> Self {
        Self {
            bucket,
            last_seen_ms: AtomicU64::new(now_ms),
        }
    }

    #[inline]
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Records activity. Never moves the timestamp backwards.
    #[inline]
    pub fn touch(&self, now_ms: u64) {
        self.last_seen_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }
}

/// Outcome of [`BucketRegistry::get_or_create`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The client was already tracked.
    Existing(Arc<BucketEntry>),
    /// A new entry was inserted for the client.
    Created(Arc<BucketEntry>),
    /// The registry is at `max_buckets`; nothing was inserted.
    Full,
}

/// Bounded, sharded map of per-client buckets.
pub struct BucketRegistry {
    buckets: DashMap<String, Arc<BucketEntry>, ahash::RandomState>,
    active_count: AtomicUsize,
    max_buckets: usize,
    /// Set while at capacity, so the warning fires once per episode.
    saturated: AtomicBool,
}

impl BucketRegistry {
    /// Creates an empty registry holding at most `max_buckets` clients.
    pub fn new(max_buckets: usize) -> Self {
        // Scale shards to the core count, capped for memory efficiency
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, 64);

        let initial_capacity = (max_buckets / num_shards).clamp(16, 1024);

        Self {
            buckets: DashMap::with_capacity_and_hasher_and_shard_amount(
                initial_capacity,
                ahash::RandomState::new(),
                num_shards,
            ),
            active_count: AtomicUsize::new(0),
            max_buckets,
            saturated: AtomicBool::new(false),
        }
    }

    /// Looks up an existing entry.
    #[inline]
    pub fn get(&self, client_id: &str) -> Option<Arc<BucketEntry>> {
        self.buckets.get(client_id).map(|entry| entry.value().clone())
    }

    /// Returns the client's entry, inserting the one built by `make` if the
    /// client is unseen and there is room.
    ///
    /// `make` runs at most once and only while the slot is reserved.
    pub fn get_or_create<F>(&self, client_id: &str, make: F) -> Lookup
    where
        F: FnOnce() -> BucketEntry,
    {
        if let Some(entry) = self.get(client_id) {
            return Lookup::Existing(entry);
        }

        if self.active_count.load(Ordering::Acquire) >= self.max_buckets {
            return self.reject(client_id);
        }

        match self.buckets.entry(client_id.to_owned()) {
            Entry::Occupied(occupied) => Lookup::Existing(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let prev = self.active_count.fetch_add(1, Ordering::AcqRel);
                if prev >= self.max_buckets {
                    self.active_count.fetch_sub(1, Ordering::AcqRel);
                    return self.reject(client_id);
                }

                let entry = Arc::new(make());
                vacant.insert(entry.clone());
                debug!(client = %client_id, total = prev + 1, "Created bucket");
                Lookup::Created(entry)
            }
        }
    }

    fn reject(&self, client_id: &str) -> Lookup {
        if !self.saturated.swap(true, Ordering::AcqRel) {
            warn!(max = self.max_buckets, "Bucket registry full, rejecting new clients");
        }
        debug!(client = %client_id, "Rejected new client, registry full");
        Lookup::Full
    }

    fn release_saturation(&self) {
        if self.len() < self.max_buckets && self.saturated.swap(false, Ordering::AcqRel) {
            debug!(active = self.len(), "Bucket registry has room again");
        }
    }

    /// Whether new clients were turned away since room last opened up.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.saturated.load(Ordering::Acquire)
    }

    /// Stops tracking a client. Returns whether it was tracked.
    pub fn remove(&self, client_id: &str) -> bool {
        if self.buckets.remove(client_id).is_some() {
            self.active_count.fetch_sub(1, Ordering::AcqRel);
            self.release_saturation();
            true
        } else {
            false
        }
    }

    /// Evicts every entry last seen before `cutoff_ms`. Returns how many were
    /// removed.
    pub fn sweep(&self, cutoff_ms: u64) -> usize {
        let mut removed = 0;

        self.buckets.retain(|client_id, entry| {
            if entry.last_seen_ms() >= cutoff_ms {
                true
            } else {
                debug!(client = %client_id, "Evicting idle bucket");
                removed += 1;
                self.active_count.fetch_sub(1, Ordering::AcqRel);
                false
            }
        });

        self.release_saturation();
        removed
    }

    /// Number of tracked clients.
    #[inline]
    pub fn len(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Fraction of `max_buckets` in use.
    #[inline]
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.max_buckets.max(1) as f64
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("active", &self.len())
            .field("max_buckets", &self.max_buckets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn entry(now_ms: u64) -> BucketEntry {
        BucketEntry::new(TokenBucket::new(5, 1.0, Instant::now()), now_ms)
    }

    #[test]
    fn test_create_then_reuse() {
        let registry = BucketRegistry::new(10);

        let first = registry.get_or_create("ip:192.168.1.1", || entry(0));
        assert!(matches!(first, Lookup::Created(_)));

        let second = registry.get_or_create("ip:192.168.1.1", || panic!("must not rebuild"));
        assert!(matches!(second, Lookup::Existing(_)));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bound_is_enforced() {
        let registry = BucketRegistry::new(3);
        for i in 0..3 {
            let id = format!("ip:10.0.0.{i}");
            assert!(matches!(registry.get_or_create(&id, || entry(0)), Lookup::Created(_)));
        }

        assert!(matches!(registry.get_or_create("ip:10.0.0.99", || entry(0)), Lookup::Full));
        assert!(registry.get("ip:10.0.0.99").is_none());

        // Existing clients are still served at capacity
        assert!(matches!(registry.get_or_create("ip:10.0.0.1", || entry(0)), Lookup::Existing(_)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove() {
        let registry = BucketRegistry::new(10);
        registry.get_or_create("ip:1.1.1.1", || entry(0));

        assert!(registry.remove("ip:1.1.1.1"));
        assert!(!registry.remove("ip:1.1.1.1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_evicts_only_idle() {
        let registry = BucketRegistry::new(10);
        registry.get_or_create("ip:idle", || entry(1_000));
        registry.get_or_create("ip:fresh", || entry(5_000));

        let touched = registry.get("ip:idle").unwrap();
        touched.touch(500); // older reading is ignored
        assert_eq!(touched.last_seen_ms(), 1_000);

        assert_eq!(registry.sweep(2_000), 1);
        assert!(registry.get("ip:idle").is_none());
        assert!(registry.get("ip:fresh").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_frees_room_for_new_clients() {
        let registry = BucketRegistry::new(1);
        registry.get_or_create("ip:a", || entry(0));
        assert!(matches!(registry.get_or_create("ip:b", || entry(0)), Lookup::Full));

        registry.sweep(1);
        assert!(matches!(registry.get_or_create("ip:b", || entry(10)), Lookup::Created(_)));
    }

    #[test]
    fn test_saturation_flag_tracks_full_episodes() {
        let registry = BucketRegistry::new(2);
        registry.get_or_create("ip:a", || entry(0));
        registry.get_or_create("ip:b", || entry(0));
        assert!(!registry.is_saturated());

        for i in 0..100 {
            let id = format!("ip:flood-{i}");
            assert!(matches!(registry.get_or_create(&id, || entry(0)), Lookup::Full));
        }
        assert!(registry.is_saturated());

        assert!(registry.remove("ip:a"));
        assert!(!registry.is_saturated());
        assert!(matches!(registry.get_or_create("ip:c", || entry(0)), Lookup::Created(_)));

        assert!(matches!(registry.get_or_create("ip:d", || entry(0)), Lookup::Full));
        assert!(registry.is_saturated());
        assert_eq!(registry.sweep(1), 2);
        assert!(!registry.is_saturated());
    }

    #[test]
    fn test_concurrent_creation_respects_bound() {
        let registry = Arc::new(BucketRegistry::new(50));
        let mut handles = vec![];

        for t in 0..8 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let mut created = 0;
                for i in 0..20 {
                    let id = format!("ip:10.{t}.0.{i}");
                    if let Lookup::Created(_) = registry.get_or_create(&id, || entry(0)) {
                        created += 1;
                    }
                }
                created
            }));
        }

        let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(created, 50);
        assert_eq!(registry.len(), 50);
    }
}
