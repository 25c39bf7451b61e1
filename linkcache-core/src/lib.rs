//! linkcache core types
//!
//! Identifier parsing, content references, resolver configuration, the
//! backend provider trait and the error taxonomy. Every other crate in the
//! workspace depends on this one; it carries no caching logic itself.

pub mod config;
pub mod error;
pub mod provider;
pub mod reference;
pub mod uri;

pub use config::{LinkResolverConfig, SchemaKey, SUPPORTED_CHARSETS};
pub use error::{ConfigError, EncodingError, LinkError, LinkResult};
pub use provider::LinkProvider;
pub use reference::{ContentReference, PageReference, SchemaDescriptor};
pub use uri::{ItemScope, TcmUri, ITEM_TYPE_COMPONENT, ITEM_TYPE_PUBLICATION, TCM_PREFIX};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier for invalidation events, UUIDv7 so ids sort by creation time.
pub type EventId = Uuid;

/// Generate a new UUIDv7 event id.
pub fn new_event_id() -> EventId {
    Uuid::now_v7()
}
