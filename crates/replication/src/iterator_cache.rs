//! Leader-side cache of in-progress tailing positions, keyed by
//! `(follower_node_hash, expected_next_seq_no)` (§4.3 "Iterator cache").
//!
//! The engine's [`laser_engine::PartitionEngine::batches_since`] scan is
//! cheap enough in this implementation that the cache has no performance
//! payoff of its own, but it still carries the contract callers rely on:
//! a follower retrying the same `from_seq_no` is a cache hit (no log
//! rescan needed, by construction); a mismatched `from_seq_no` evicts
//! whatever position was recorded for that follower and forces a fresh
//! scan; idle entries age out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A single follower's last-served tailing position.
#[derive(Debug, Clone, Copy)]
struct CachedPosition {
    next_seq_no: u64,
    last_used: Instant,
}

/// Reader-writer-guarded map of per-follower tailing positions (§5 "The
/// iterator cache is per Replication DB and guarded by a reader-writer
/// lock").
pub struct IteratorCache {
    entries: RwLock<HashMap<i64, CachedPosition>>,
    idle_timeout: Duration,
}

impl IteratorCache {
    pub fn new(idle_timeout: Duration) -> Self {
        IteratorCache { entries: RwLock::new(HashMap::new()), idle_timeout }
    }

    /// Whether `from_seq_no` continues the cached position for this
    /// follower. `false` means either no entry exists yet or the
    /// follower's request diverged from where it last left off.
    pub fn hit(&self, follower_node_hash: i64, from_seq_no: u64) -> bool {
        let entries = self.entries.read();
        matches!(entries.get(&follower_node_hash), Some(pos) if pos.next_seq_no == from_seq_no)
    }

    /// Record that this follower has now been served up to (but not
    /// including) `next_seq_no`.
    pub fn record(&self, follower_node_hash: i64, next_seq_no: u64) {
        self.entries
            .write()
            .insert(follower_node_hash, CachedPosition { next_seq_no, last_used: Instant::now() });
    }

    /// Drop a follower's cached position outright, e.g. after it falls
    /// back to bulk transfer and will resume tailing from a new
    /// `base_version`'s starting seq_no.
    pub fn invalidate(&self, follower_node_hash: i64) {
        self.entries.write().remove(&follower_node_hash);
    }

    /// Drop entries idle beyond `idle_timeout`. Call periodically from the
    /// leader's housekeeping loop.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, pos| now.duration_since(pos.last_used) < self.idle_timeout);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_request_hits_cache() {
        let cache = IteratorCache::new(Duration::from_secs(30));
        cache.record(1, 101);
        assert!(cache.hit(1, 101));
        assert!(!cache.hit(1, 50));
        assert!(!cache.hit(2, 101));
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = IteratorCache::new(Duration::from_secs(30));
        cache.record(1, 101);
        cache.invalidate(1);
        assert_eq!(cache.len(), 0);
        assert!(!cache.hit(1, 101));
    }
}
