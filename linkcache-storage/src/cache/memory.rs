//! In-memory scoped cache backed by sharded concurrent maps.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use linkcache_core::ItemScope;

use super::entry::CacheEntry;
use super::traits::{CacheCounters, CacheStats, ScopedCache};

#[derive(Debug)]
struct Slot<V> {
    entry: Arc<CacheEntry<V>>,
    scope: Option<ItemScope>,
}

/// In-memory [`ScopedCache`].
///
/// Entries and the scope index live in separate `DashMap`s; every operation
/// touches one shard at a time, so unrelated keys never wait on each other
/// and no shard lock is held while another map is locked.
///
/// Eviction is out of scope here: entries stay until removed.
#[derive(Debug)]
pub struct InMemoryScopedCache<V> {
    entries: DashMap<String, Slot<V>>,
    scopes: DashMap<ItemScope, HashSet<String>>,
    counters: CacheCounters,
}

impl<V> Default for InMemoryScopedCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            scopes: DashMap::new(),
            counters: CacheCounters::default(),
        }
    }
}

impl<V> InMemoryScopedCache<V>
where
    V: Clone + Default + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently tagged with `scope`.
    pub fn keys_for_scope(&self, scope: ItemScope) -> Vec<String> {
        self.scopes
            .get(&scope)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn unindex(&self, key: &str, scope: ItemScope) {
        if let Some(mut keys) = self.scopes.get_mut(&scope) {
            keys.remove(key);
        }
        self.scopes.remove_if(&scope, |_, keys| keys.is_empty());
    }

    fn expire_keys(&self, scope: ItemScope, keys: Vec<String>) -> u64 {
        let mut expired = 0;
        for key in keys {
            let entry = self
                .entries
                .get(&key)
                .filter(|slot| slot.scope == Some(scope))
                .map(|slot| Arc::clone(&slot.entry));
            if let Some(entry) = entry {
                if entry.expire() {
                    expired += 1;
                }
            }
        }
        self.counters.invalidated.fetch_add(expired, Ordering::Relaxed);
        expired
    }
}

impl<V> ScopedCache<V> for InMemoryScopedCache<V>
where
    V: Clone + Default + Send + Sync + 'static,
{
    fn load(&self, key: &str) -> Arc<CacheEntry<V>> {
        let existing = self.entries.get(key).map(|slot| Arc::clone(&slot.entry));
        let entry = match existing {
            Some(entry) => entry,
            None => Arc::clone(
                &self
                    .entries
                    .entry(key.to_string())
                    .or_insert_with(|| Slot {
                        entry: Arc::new(CacheEntry::absent()),
                        scope: None,
                    })
                    .entry,
            ),
        };

        if entry.is_expired() {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    fn peek(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.entries.get(key).map(|slot| Arc::clone(&slot.entry))
    }

    fn store(&self, key: &str, entry: Arc<CacheEntry<V>>, scope: ItemScope) {
        let previous = self.entries.insert(
            key.to_string(),
            Slot {
                entry,
                scope: Some(scope),
            },
        );
        if let Some(old_scope) = previous.and_then(|slot| slot.scope) {
            if old_scope != scope {
                self.unindex(key, old_scope);
            }
        }
        self.scopes
            .entry(scope)
            .or_default()
            .insert(key.to_string());
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
    }

    fn remove(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, slot)) => {
                if let Some(scope) = slot.scope {
                    self.unindex(key, scope);
                }
                true
            }
            None => false,
        }
    }

    fn scope_of(&self, key: &str) -> Option<ItemScope> {
        self.entries.get(key).and_then(|slot| slot.scope)
    }

    fn invalidate_by_scope(&self, scope: ItemScope) -> u64 {
        let keys = self.keys_for_scope(scope);
        self.expire_keys(scope, keys)
    }

    fn invalidate_publication(&self, publication_id: i32) -> u64 {
        let scopes: Vec<ItemScope> = self
            .scopes
            .iter()
            .map(|item| *item.key())
            .filter(|scope| scope.publication_id == publication_id)
            .collect();
        scopes
            .into_iter()
            .map(|scope| self.invalidate_by_scope(scope))
            .sum()
    }

    fn stats(&self) -> CacheStats {
        self.counters
            .snapshot(self.entries.len() as u64, self.scopes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn stored(cache: &InMemoryScopedCache<String>, key: &str, url: &str, scope: ItemScope) {
        cache.store(key, Arc::new(CacheEntry::new(url.to_string())), scope);
    }

    #[test]
    fn test_load_unknown_key_returns_expired_placeholder() {
        let cache: InMemoryScopedCache<String> = InMemoryScopedCache::new();
        let entry = cache.load("CL-tcm:1-100");
        assert!(entry.is_expired());
        assert_eq!(entry.payload(), "");
        assert_eq!(cache.scope_of("CL-tcm:1-100"), None);

        // The placeholder is shared by later loads.
        let again = cache.load("CL-tcm:1-100");
        assert!(Arc::ptr_eq(&entry, &again));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_peek_does_not_create_placeholder() {
        let cache: InMemoryScopedCache<String> = InMemoryScopedCache::new();
        assert!(cache.peek("CL-tcm:1-100").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_then_load_hits() {
        let cache = InMemoryScopedCache::new();
        stored(&cache, "CL-tcm:1-100", "/a", ItemScope::new(1, 100));

        let entry = cache.load("CL-tcm:1-100");
        assert_eq!(entry.valid_payload().as_deref(), Some("/a"));
        assert_eq!(cache.scope_of("CL-tcm:1-100"), Some(ItemScope::new(1, 100)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.scope_count, 1);
    }

    #[test]
    fn test_invalidate_by_scope_expires_all_tagged_keys() {
        let cache = InMemoryScopedCache::new();
        let scope = ItemScope::new(1, 100);
        stored(&cache, "CL-tcm:1-100", "/a", scope);
        stored(&cache, "CLP-tcm:1-100|tcm:1-7-64", "/a", scope);
        stored(&cache, "CL-tcm:1-101", "/b", ItemScope::new(1, 101));

        assert_eq!(cache.invalidate_by_scope(scope), 2);

        assert!(cache.peek("CL-tcm:1-100").unwrap().is_expired());
        assert!(cache.peek("CLP-tcm:1-100|tcm:1-7-64").unwrap().is_expired());
        assert!(!cache.peek("CL-tcm:1-101").unwrap().is_expired());

        // Entries are flagged, not removed.
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.peek("CL-tcm:1-100").unwrap().payload(), "/a");
        assert_eq!(cache.stats().invalidated, 2);
    }

    #[test]
    fn test_invalidate_unknown_scope_is_noop() {
        let cache: InMemoryScopedCache<String> = InMemoryScopedCache::new();
        assert_eq!(cache.invalidate_by_scope(ItemScope::new(9, 9)), 0);
    }

    #[test]
    fn test_invalidate_publication() {
        let cache = InMemoryScopedCache::new();
        stored(&cache, "CL-tcm:1-100", "/a", ItemScope::new(1, 100));
        stored(&cache, "CL-tcm:1-101", "/b", ItemScope::new(1, 101));
        stored(&cache, "CL-tcm:2-100", "/c", ItemScope::new(2, 100));

        assert_eq!(cache.invalidate_publication(1), 2);
        assert!(!cache.peek("CL-tcm:2-100").unwrap().is_expired());
    }

    #[test]
    fn test_restore_under_new_scope_moves_index() {
        let cache = InMemoryScopedCache::new();
        stored(&cache, "k", "/a", ItemScope::new(1, 1));
        stored(&cache, "k", "/b", ItemScope::new(1, 2));

        assert!(cache.keys_for_scope(ItemScope::new(1, 1)).is_empty());
        assert_eq!(cache.keys_for_scope(ItemScope::new(1, 2)), vec!["k".to_string()]);
        assert_eq!(cache.invalidate_by_scope(ItemScope::new(1, 1)), 0);
        assert_eq!(cache.stats().scope_count, 1);
    }

    #[test]
    fn test_remove_unindexes() {
        let cache = InMemoryScopedCache::new();
        stored(&cache, "k", "/a", ItemScope::new(1, 1));
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        assert!(cache.keys_for_scope(ItemScope::new(1, 1)).is_empty());
        assert_eq!(cache.stats().scope_count, 0);
    }

    #[test]
    fn test_placeholder_is_not_invalidated_before_store() {
        let cache: InMemoryScopedCache<String> = InMemoryScopedCache::new();
        let placeholder = cache.load("k");
        let epoch = placeholder.epoch();
        assert_eq!(cache.invalidate_by_scope(ItemScope::new(1, 1)), 0);
        assert_eq!(placeholder.epoch(), epoch);
    }

    #[test]
    fn test_concurrent_invalidation_and_store() {
        let cache: Arc<InMemoryScopedCache<String>> = Arc::new(InMemoryScopedCache::new());
        let scope = ItemScope::new(3, 30);

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("CL-{t}-{i}");
                        cache.store(&key, Arc::new(CacheEntry::new(format!("/{i}"))), scope);
                        let _ = cache.load(&key);
                    }
                })
            })
            .collect();
        let invalidator = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..200 {
                    cache.invalidate_by_scope(scope);
                }
            })
        };
        for handle in writers {
            handle.join().unwrap();
        }
        invalidator.join().unwrap();

        assert_eq!(cache.keys_for_scope(scope).len(), 800);
        cache.invalidate_by_scope(scope);
        for key in cache.keys_for_scope(scope) {
            assert!(cache.peek(&key).unwrap().is_expired());
        }
    }
}
