//! Composite content identifiers.
//!
//! Content is addressed by URIs of the form `tcm:{publication}-{item}`,
//! optionally followed by `-{item_type}` and `-v{version}`. The
//! `(publication, item)` pair is the scope that cache invalidation works on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{LinkError, LinkResult};

/// URI scheme prefix.
pub const TCM_PREFIX: &str = "tcm:";

/// Item type assumed when the URI omits it.
pub const ITEM_TYPE_COMPONENT: i32 = 16;

/// Item type of a publication.
pub const ITEM_TYPE_PUBLICATION: i32 = 1;

/// Scope a cache entry is invalidated alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemScope {
    pub publication_id: i32,
    pub item_id: i32,
}

impl ItemScope {
    pub fn new(publication_id: i32, item_id: i32) -> Self {
        Self {
            publication_id,
            item_id,
        }
    }
}

impl fmt::Display for ItemScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.publication_id, self.item_id)
    }
}

/// Parsed composite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcmUri {
    publication_id: i32,
    item_id: i32,
    item_type: i32,
    version: Option<i32>,
}

impl TcmUri {
    pub fn new(publication_id: i32, item_id: i32, item_type: i32) -> Self {
        Self {
            publication_id,
            item_id,
            item_type,
            version: None,
        }
    }

    /// Parse a URI string, reporting the offending input on failure.
    pub fn parse(uri: &str) -> LinkResult<Self> {
        uri.parse()
    }

    pub fn publication_id(&self) -> i32 {
        self.publication_id
    }

    pub fn item_id(&self) -> i32 {
        self.item_id
    }

    pub fn item_type(&self) -> i32 {
        self.item_type
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    /// The invalidation scope of this item.
    pub fn scope(&self) -> ItemScope {
        ItemScope::new(self.publication_id, self.item_id)
    }

    /// URI of the publication owning this item (`tcm:0-{pub}-1`).
    pub fn publication_uri(&self) -> TcmUri {
        TcmUri::new(0, self.publication_id, ITEM_TYPE_PUBLICATION)
    }
}

impl fmt::Display for TcmUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", TCM_PREFIX, self.publication_id, self.item_id)?;
        if self.item_type != ITEM_TYPE_COMPONENT || self.version.is_some() {
            write!(f, "-{}", self.item_type)?;
        }
        if let Some(version) = self.version {
            write!(f, "-v{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for TcmUri {
    type Err = LinkError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let body = uri
            .strip_prefix(TCM_PREFIX)
            .ok_or_else(|| LinkError::invalid_reference(uri, "missing 'tcm:' prefix"))?;

        let mut parts = body.split('-');
        let publication_id = parse_segment(uri, parts.next(), "publication id")?;
        let item_id = parse_segment(uri, parts.next(), "item id")?;

        let mut item_type = None;
        let mut version = None;
        for part in parts {
            if let Some(v) = part.strip_prefix('v') {
                if version.is_some() {
                    return Err(LinkError::invalid_reference(uri, "duplicate version segment"));
                }
                version = Some(parse_segment(uri, Some(v), "version")?);
            } else if version.is_none() && item_type.is_none() {
                item_type = Some(parse_segment(uri, Some(part), "item type")?);
            } else {
                return Err(LinkError::invalid_reference(uri, "unexpected trailing segment"));
            }
        }

        Ok(Self {
            publication_id,
            item_id,
            item_type: item_type.unwrap_or(ITEM_TYPE_COMPONENT),
            version,
        })
    }
}

fn parse_segment(uri: &str, segment: Option<&str>, what: &str) -> LinkResult<i32> {
    let segment = segment
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LinkError::invalid_reference(uri, format!("missing {}", what)))?;
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LinkError::invalid_reference(
            uri,
            format!("{} is not numeric", what),
        ));
    }
    segment
        .parse()
        .map_err(|_| LinkError::invalid_reference(uri, format!("{} out of range", what)))
}
