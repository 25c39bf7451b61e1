//! Content references handed to the resolver by callers.

use serde::{Deserialize, Serialize};

use crate::{LinkResult, TcmUri};

/// Schema (content type) of a referenced component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub id: String,
    pub title: String,
}

impl SchemaDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A link target: a component identifier plus the metadata the resolver
/// consults before falling back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentReference {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// URL of an embedded binary, already resolved by the content pipeline.
    #[serde(default)]
    pub multimedia_url: Option<String>,
    #[serde(default)]
    pub schema: SchemaDescriptor,
}

impl ContentReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_multimedia_url(mut self, url: impl Into<String>) -> Self {
        self.multimedia_url = Some(url.into());
        self
    }

    /// Embedded media URL, ignoring empty values.
    pub fn embedded_url(&self) -> Option<&str> {
        self.multimedia_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn uri(&self) -> LinkResult<TcmUri> {
        TcmUri::parse(&self.id)
    }
}

/// The page a link is rendered on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub id: String,
}

impl PageReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
