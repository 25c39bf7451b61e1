//! linkcache storage - scoped link cache and resolution engine
//!
//! Resolves content references to URLs through a cache whose entries are
//! invalidated by publication scope. The backend lookup itself is supplied
//! by the caller as a [`linkcache_core::LinkProvider`].

pub mod cache;
pub mod invalidation;
pub mod resolver;
pub mod telemetry;
pub mod template;

pub use cache::{
    CacheEntry, CacheStats, EntrySnapshot, InMemoryScopedCache, LinkCacheKey, ScopedCache,
};
pub use invalidation::{
    apply_event, InvalidationError, InvalidationEvent, InvalidationKind, InvalidationListener,
    InvalidationMetrics, InvalidationSnapshot,
};
pub use resolver::{LinkResolutionEngine, ResolverMetrics, ResolverSnapshot};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
