//! Versioned, expirable cache entries.
//!
//! An entry is never deleted by invalidation. Invalidation flips the
//! `expired` flag and bumps an epoch counter; a refresh that started before
//! the invalidation observes the old epoch and leaves the entry expired, so a
//! publish event that lands mid-resolution is never lost.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use linkcache_core::Timestamp;

/// Point-in-time copy of an entry's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot<V> {
    pub payload: V,
    pub expired: bool,
    pub epoch: u64,
    pub stored_at: Option<Timestamp>,
}

#[derive(Debug)]
struct EntryState<V> {
    payload: V,
    expired: bool,
    epoch: u64,
    stored_at: Option<Timestamp>,
}

/// A cached value plus its expiry flag.
///
/// Field access goes through a short-lived state mutex that is never held
/// across an await point. The separate async refresh lock is what callers hold
/// while recomputing the value, so at most one refresh per entry is in flight.
#[derive(Debug)]
pub struct CacheEntry<V> {
    state: Mutex<EntryState<V>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<V: Clone> CacheEntry<V> {
    /// A freshly stored, valid entry.
    pub fn new(payload: V) -> Self {
        Self::with_state(payload, false, Some(Utc::now()))
    }

    /// An entry that must be recomputed before use.
    pub fn expired_with(payload: V) -> Self {
        Self::with_state(payload, true, None)
    }

    fn with_state(payload: V, expired: bool, stored_at: Option<Timestamp>) -> Self {
        Self {
            state: Mutex::new(EntryState {
                payload,
                expired,
                epoch: 0,
                stored_at,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EntryState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_expired(&self) -> bool {
        self.state().expired
    }

    pub fn payload(&self) -> V {
        self.state().payload.clone()
    }

    /// Payload if the entry is currently valid, checked and read atomically.
    pub fn valid_payload(&self) -> Option<V> {
        let state = self.state();
        (!state.expired).then(|| state.payload.clone())
    }

    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    pub fn stored_at(&self) -> Option<Timestamp> {
        self.state().stored_at
    }

    pub fn snapshot(&self) -> EntrySnapshot<V> {
        let state = self.state();
        EntrySnapshot {
            payload: state.payload.clone(),
            expired: state.expired,
            epoch: state.epoch,
            stored_at: state.stored_at,
        }
    }

    /// Mark the entry expired. Returns true if it was valid before.
    pub fn expire(&self) -> bool {
        let mut state = self.state();
        state.epoch = state.epoch.wrapping_add(1);
        !std::mem::replace(&mut state.expired, true)
    }

    /// Install a recomputed payload.
    ///
    /// The entry becomes valid only if no invalidation happened since
    /// `observed_epoch` was read; otherwise the payload is kept but the entry
    /// stays expired. Returns whether the entry is now valid.
    pub fn refresh(&self, payload: V, observed_epoch: u64) -> bool {
        let mut state = self.state();
        state.payload = payload;
        state.stored_at = Some(Utc::now());
        state.expired = state.epoch != observed_epoch;
        !state.expired
    }

    /// Acquire the per-entry refresh lock.
    pub async fn lock_refresh(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}

impl<V: Clone + Default> CacheEntry<V> {
    /// Placeholder for a key that has never been resolved.
    pub fn absent() -> Self {
        Self::expired_with(V::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_entry_is_valid() {
        let entry = CacheEntry::new("/a".to_string());
        assert!(!entry.is_expired());
        assert_eq!(entry.valid_payload().as_deref(), Some("/a"));
        assert!(entry.stored_at().is_some());
    }

    #[test]
    fn test_absent_entry_is_expired_and_empty() {
        let entry: CacheEntry<String> = CacheEntry::absent();
        assert!(entry.is_expired());
        assert_eq!(entry.valid_payload(), None);
        assert_eq!(entry.payload(), "");
        assert!(entry.stored_at().is_none());
    }

    #[test]
    fn test_expire_keeps_payload() {
        let entry = CacheEntry::new("/a".to_string());
        assert!(entry.expire());
        assert!(entry.is_expired());
        assert_eq!(entry.payload(), "/a");
        assert_eq!(entry.epoch(), 1);

        // Expiring twice bumps the epoch but reports it was already expired.
        assert!(!entry.expire());
        assert_eq!(entry.epoch(), 2);
    }

    #[test]
    fn test_refresh_validates_when_epoch_unchanged() {
        let entry: CacheEntry<String> = CacheEntry::absent();
        let epoch = entry.epoch();
        assert!(entry.refresh("/b".to_string(), epoch));
        let snapshot = entry.snapshot();
        assert_eq!(snapshot.payload, "/b");
        assert!(!snapshot.expired);
        assert!(snapshot.stored_at.is_some());
    }

    #[test]
    fn test_refresh_after_concurrent_invalidation_stays_expired() {
        let entry: CacheEntry<String> = CacheEntry::absent();
        let epoch = entry.epoch();
        entry.expire();
        assert!(!entry.refresh("/stale".to_string(), epoch));
        assert!(entry.is_expired());
        assert_eq!(entry.payload(), "/stale");
    }

    #[tokio::test]
    async fn test_refresh_lock_is_exclusive() {
        let entry = Arc::new(CacheEntry::new(1u32));
        let guard = entry.lock_refresh().await;
        assert!(entry.refresh_lock.try_lock().is_err());
        drop(guard);
        assert!(entry.refresh_lock.try_lock().is_ok());
    }
}
