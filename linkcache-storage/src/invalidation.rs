//! Invalidation events pushed by the content management side.
//!
//! Publish and unpublish notifications carry the `(publication, item)` scope
//! of the changed item; a flush carries only a publication. Events arrive
//! over a channel and are applied to a [`ScopedCache`] by an
//! [`InvalidationListener`] task.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use linkcache_core::{new_event_id, ItemScope, LinkResult, TcmUri, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::cache::ScopedCache;

/// Errors for malformed invalidation events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error("Malformed invalidation event: {reason}")]
    Malformed { reason: String },

    #[error("Invalidation event {event_id} ({kind:?}) is missing an item id")]
    MissingItem {
        event_id: Uuid,
        kind: InvalidationKind,
    },
}

/// What happened to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationKind {
    Publish,
    Unpublish,
    /// Every cached link of a publication is suspect.
    Flush,
}

/// A single invalidation notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    #[serde(default = "new_event_id")]
    pub event_id: Uuid,
    pub kind: InvalidationKind,
    pub publication_id: i32,
    #[serde(default)]
    pub item_id: Option<i32>,
    #[serde(default = "Utc::now")]
    pub occurred_at: Timestamp,
}

impl InvalidationEvent {
    fn new(kind: InvalidationKind, publication_id: i32, item_id: Option<i32>) -> Self {
        Self {
            event_id: new_event_id(),
            kind,
            publication_id,
            item_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn published(scope: ItemScope) -> Self {
        Self::new(
            InvalidationKind::Publish,
            scope.publication_id,
            Some(scope.item_id),
        )
    }

    pub fn unpublished(scope: ItemScope) -> Self {
        Self::new(
            InvalidationKind::Unpublish,
            scope.publication_id,
            Some(scope.item_id),
        )
    }

    pub fn flush(publication_id: i32) -> Self {
        Self::new(InvalidationKind::Flush, publication_id, None)
    }

    /// Build a publish/unpublish event from an item URI.
    pub fn for_uri(kind: InvalidationKind, uri: &str) -> LinkResult<Self> {
        let uri = TcmUri::parse(uri)?;
        Ok(Self::new(kind, uri.publication_id(), Some(uri.item_id())))
    }

    /// Parse and validate an event from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, InvalidationError> {
        let event: Self = serde_json::from_str(raw).map_err(|e| InvalidationError::Malformed {
            reason: e.to_string(),
        })?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), InvalidationError> {
        if self.kind != InvalidationKind::Flush && self.item_id.is_none() {
            return Err(InvalidationError::MissingItem {
                event_id: self.event_id,
                kind: self.kind,
            });
        }
        Ok(())
    }

    /// Item scope targeted by this event; `None` for publication flushes.
    pub fn scope(&self) -> Option<ItemScope> {
        self.item_id
            .map(|item_id| ItemScope::new(self.publication_id, item_id))
    }
}

/// Apply one event to `cache`. Returns the number of entries expired.
pub fn apply_event<V, C>(cache: &C, event: &InvalidationEvent) -> Result<u64, InvalidationError>
where
    C: ScopedCache<V> + ?Sized,
{
    event.validate()?;
    let expired = match (event.kind, event.scope()) {
        (InvalidationKind::Flush, _) => cache.invalidate_publication(event.publication_id),
        (_, Some(scope)) => cache.invalidate_by_scope(scope),
        (_, None) => 0,
    };
    tracing::debug!(
        event_id = %event.event_id,
        kind = ?event.kind,
        publication_id = event.publication_id,
        item_id = event.item_id,
        expired,
        "Applied invalidation event"
    );
    Ok(expired)
}

/// Counters for an invalidation listener.
#[derive(Debug, Default)]
pub struct InvalidationMetrics {
    pub events_applied: AtomicU64,
    pub events_rejected: AtomicU64,
    pub entries_expired: AtomicU64,
}

impl InvalidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> InvalidationSnapshot {
        InvalidationSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of listener metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSnapshot {
    pub events_applied: u64,
    pub events_rejected: u64,
    pub entries_expired: u64,
}

/// Applies invalidation events from a channel to a cache.
pub struct InvalidationListener<C, V>
where
    C: ScopedCache<V>,
{
    cache: Arc<C>,
    metrics: Arc<InvalidationMetrics>,
    _value: PhantomData<fn() -> V>,
}

impl<C, V> InvalidationListener<C, V>
where
    C: ScopedCache<V>,
{
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            metrics: Arc::new(InvalidationMetrics::new()),
            _value: PhantomData,
        }
    }

    pub fn metrics(&self) -> Arc<InvalidationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Apply one event, recording the outcome in the metrics.
    pub fn handle(&self, event: &InvalidationEvent) -> u64 {
        match apply_event::<V, C>(self.cache.as_ref(), event) {
            Ok(expired) => {
                self.metrics.events_applied.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .entries_expired
                    .fetch_add(expired, Ordering::Relaxed);
                expired
            }
            Err(e) => {
                self.metrics.events_rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Rejected invalidation event");
                0
            }
        }
    }

    /// Consume events until the channel closes or `shutdown` turns true.
    ///
    /// Dropping the shutdown sender does not stop the listener; it then runs
    /// until the event channel closes.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<InvalidationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Arc<InvalidationMetrics> {
        tracing::info!("Invalidation listener started");
        let mut shutdown_closed = false;

        loop {
            tokio::select! {
                changed = shutdown.changed(), if !shutdown_closed => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown sender dropped, listening until channel closes");
                        shutdown_closed = true;
                    } else if *shutdown.borrow() {
                        tracing::info!("Invalidation listener shutting down");
                        break;
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle(&event);
                        }
                        None => {
                            tracing::info!("Invalidation channel closed");
                            break;
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            events_applied = snapshot.events_applied,
            events_rejected = snapshot.events_rejected,
            entries_expired = snapshot.entries_expired,
            "Invalidation listener stopped"
        );
        self.metrics
    }
}
