//! Scoped link cache.
//!
//! Entries are keyed by rendered [`LinkCacheKey`]s and tagged with the
//! [`ItemScope`](linkcache_core::ItemScope) of the component they link to.
//! Invalidation never removes entries; it marks them expired so the next
//! resolution recomputes them.
//!
//! # Example
//!
//! ```ignore
//! let cache = InMemoryScopedCache::<String>::new();
//! cache.store("CL-tcm:1-100", Arc::new(CacheEntry::new("/a".into())), ItemScope::new(1, 100));
//! cache.invalidate_by_scope(ItemScope::new(1, 100));
//! assert!(cache.load("CL-tcm:1-100").is_expired());
//! ```

pub mod entry;
pub mod key;
pub mod memory;
pub mod traits;

pub use entry::{CacheEntry, EntrySnapshot};
pub use key::LinkCacheKey;
pub use memory::InMemoryScopedCache;
pub use traits::{CacheStats, ScopedCache};
