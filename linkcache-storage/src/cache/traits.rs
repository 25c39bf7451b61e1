//! Scoped cache trait and statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use linkcache_core::ItemScope;

use super::entry::CacheEntry;

/// Key/value cache whose entries are tagged with an invalidation scope.
///
/// Implementations must be safe for concurrent use: `invalidate_by_scope`
/// may run while other threads `load` and `store`, and must not serialize
/// unrelated keys behind a single global lock.
///
/// None of the operations perform I/O; the only waiting an implementation
/// may do is on short internal shard locks.
pub trait ScopedCache<V>: Send + Sync {
    /// Load the entry for `key`.
    ///
    /// Unknown keys yield an expired placeholder that is registered under the
    /// key, so concurrent callers for the same key share one entry (and one
    /// refresh lock). The placeholder carries no scope until it is stored.
    fn load(&self, key: &str) -> Arc<CacheEntry<V>>;

    /// Look up an entry without creating a placeholder.
    fn peek(&self, key: &str) -> Option<Arc<CacheEntry<V>>>;

    /// Insert or overwrite the entry for `key` and tag it with `scope`.
    fn store(&self, key: &str, entry: Arc<CacheEntry<V>>, scope: ItemScope);

    /// Drop the entry for `key`. Returns true if one existed.
    fn remove(&self, key: &str) -> bool;

    /// Scope recorded for `key`, if it has been stored.
    fn scope_of(&self, key: &str) -> Option<ItemScope>;

    /// Expire every entry tagged with `scope`. Returns the number of entries
    /// that were valid and are now expired.
    fn invalidate_by_scope(&self, scope: ItemScope) -> u64;

    /// Expire every entry of a publication. Returns the number of entries
    /// that were valid and are now expired.
    fn invalidate_publication(&self, publication_id: i32) -> u64;

    /// Get cache statistics.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads that found a valid entry.
    pub hits: u64,
    /// Loads that found nothing or an expired entry.
    pub misses: u64,
    /// Number of store calls.
    pub stores: u64,
    /// Entries flipped from valid to expired by invalidation.
    pub invalidated: u64,
    /// Number of entries currently in cache, placeholders included.
    pub entry_count: u64,
    /// Number of distinct scopes with at least one stored key.
    pub scope_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters backing [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub stores: AtomicU64,
    pub invalidated: AtomicU64,
}

impl CacheCounters {
    pub fn snapshot(&self, entry_count: u64, scope_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            entry_count,
            scope_count,
        }
    }
}
