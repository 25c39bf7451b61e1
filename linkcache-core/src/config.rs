//! Configuration types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LinkError, LinkResult};

/// How a schema is turned into a lookup key for the static URL mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKey {
    /// Numeric item id of the schema URI.
    Id,
    /// Schema display title.
    Title,
    /// Raw schema URI.
    #[default]
    #[serde(other)]
    Uri,
}

impl SchemaKey {
    /// Parse a configured key name. Unknown names select [`SchemaKey::Uri`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "id" => Self::Id,
            "title" => Self::Title,
            _ => Self::Uri,
        }
    }
}

/// Charsets supported for placeholder encoding.
pub const SUPPORTED_CHARSETS: &[&str] = &["UTF-8", "US-ASCII"];

/// Link resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkResolverConfig {
    /// Lookup key mode for `schema_to_url_mappings`.
    pub schema_key: SchemaKey,
    /// Percent-encode placeholder values substituted into mapped templates.
    pub encode_url: bool,
    /// Charset used when percent-encoding placeholder values.
    pub url_charset: String,
    /// Prefix prepended to every non-empty resolved link.
    pub context_path: Option<String>,
    /// Static schema to URL-template table consulted before the backend.
    pub schema_to_url_mappings: HashMap<String, String>,
}

impl Default for LinkResolverConfig {
    fn default() -> Self {
        Self {
            schema_key: SchemaKey::Uri,
            encode_url: true,
            url_charset: "UTF-8".to_string(),
            context_path: None,
            schema_to_url_mappings: HashMap::new(),
        }
    }
}

impl LinkResolverConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_key(mut self, schema_key: SchemaKey) -> Self {
        self.schema_key = schema_key;
        self
    }

    pub fn with_encode_url(mut self, encode_url: bool) -> Self {
        self.encode_url = encode_url;
        self
    }

    pub fn with_url_charset(mut self, charset: impl Into<String>) -> Self {
        self.url_charset = charset.into();
        self
    }

    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = Some(context_path.into());
        self
    }

    /// Add a single schema mapping.
    pub fn with_mapping(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.schema_to_url_mappings.insert(key.into(), template.into());
        self
    }

    pub fn with_mappings(mut self, mappings: HashMap<String, String>) -> Self {
        self.schema_to_url_mappings = mappings;
        self
    }

    /// Context path if configured and non-empty.
    pub fn effective_context_path(&self) -> Option<&str> {
        self.context_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - context_path, when set, starts with '/' and does not end with '/'
    /// - url_charset is one of [`SUPPORTED_CHARSETS`]
    /// - no mapping has an empty key or template
    pub fn validate(&self) -> LinkResult<()> {
        if let Some(path) = self.effective_context_path() {
            if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) || path == "/" {
                return Err(LinkError::Config(ConfigError::InvalidValue {
                    field: "context_path".to_string(),
                    value: path.to_string(),
                    reason: "context_path must start with '/' and must not end with '/'"
                        .to_string(),
                }));
            }
        }

        if !SUPPORTED_CHARSETS
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&self.url_charset))
        {
            return Err(LinkError::Config(ConfigError::InvalidValue {
                field: "url_charset".to_string(),
                value: self.url_charset.clone(),
                reason: format!("url_charset must be one of {:?}", SUPPORTED_CHARSETS),
            }));
        }

        for (key, template) in &self.schema_to_url_mappings {
            if key.is_empty() || template.is_empty() {
                return Err(LinkError::Config(ConfigError::InvalidValue {
                    field: "schema_to_url_mappings".to_string(),
                    value: format!("{key:?} => {template:?}"),
                    reason: "mapping keys and templates must be non-empty".to_string(),
                }));
            }
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LINKCACHE_SCHEMA_KEY`: `id`, `title` or `uri` (default: uri)
    /// - `LINKCACHE_ENCODE_URL`: `true`/`1` or `false`/`0` (default: true)
    /// - `LINKCACHE_URL_CHARSET`: placeholder encoding charset (default: UTF-8)
    /// - `LINKCACHE_CONTEXT_PATH`: link prefix (default: none)
    /// - `LINKCACHE_SCHEMA_URL_MAPPINGS`: JSON object of schema key to template
    pub fn from_env() -> LinkResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup, as [`Self::from_env`] does.
    pub fn from_lookup<F>(lookup: F) -> LinkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let encode_url = match lookup("LINKCACHE_ENCODE_URL") {
            Some(raw) => parse_bool("LINKCACHE_ENCODE_URL", &raw)?,
            None => defaults.encode_url,
        };

        let schema_to_url_mappings = match lookup("LINKCACHE_SCHEMA_URL_MAPPINGS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                LinkError::Config(ConfigError::InvalidValue {
                    field: "LINKCACHE_SCHEMA_URL_MAPPINGS".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })?,
            None => defaults.schema_to_url_mappings,
        };

        let config = Self {
            schema_key: lookup("LINKCACHE_SCHEMA_KEY")
                .map(|s| SchemaKey::from_name(&s))
                .unwrap_or(defaults.schema_key),
            encode_url,
            url_charset: lookup("LINKCACHE_URL_CHARSET").unwrap_or(defaults.url_charset),
            context_path: lookup("LINKCACHE_CONTEXT_PATH").filter(|s| !s.is_empty()),
            schema_to_url_mappings,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(field: &str, raw: &str) -> LinkResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(LinkError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        })),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = LinkResolverConfig::default();
        assert!(config.encode_url);
        assert_eq!(config.schema_key, SchemaKey::Uri);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LinkResolverConfig::new()
            .with_schema_key(SchemaKey::Title)
            .with_encode_url(false)
            .with_context_path("/site")
            .with_mapping("Article", "/articles/%COMPONENTTITLE%");

        assert_eq!(config.schema_key, SchemaKey::Title);
        assert!(!config.encode_url);
        assert_eq!(config.effective_context_path(), Some("/site"));
        assert_eq!(
            config.schema_to_url_mappings.get("Article").map(String::as_str),
            Some("/articles/%COMPONENTTITLE%")
        );
    }

    #[test]
    fn test_schema_key_from_name() {
        assert_eq!(SchemaKey::from_name("id"), SchemaKey::Id);
        assert_eq!(SchemaKey::from_name(" Title "), SchemaKey::Title);
        assert_eq!(SchemaKey::from_name("uri"), SchemaKey::Uri);
        assert_eq!(SchemaKey::from_name("whatever"), SchemaKey::Uri);
    }

    #[test]
    fn test_schema_key_deserializes_unknown_as_uri() {
        let key: SchemaKey = serde_json::from_str("\"title\"").unwrap();
        assert_eq!(key, SchemaKey::Title);
        let key: SchemaKey = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(key, SchemaKey::Uri);
    }

    #[test]
    fn test_validate_rejects_bad_context_path() {
        for bad in ["site", "/site/", "/"] {
            let config = LinkResolverConfig::new().with_context_path(bad);
            assert!(
                matches!(config.validate(), Err(LinkError::Config(_))),
                "{bad:?} should be rejected"
            );
        }
        let empty = LinkResolverConfig::new().with_context_path("");
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_charset() {
        let config = LinkResolverConfig::new().with_url_charset("EBCDIC");
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));
        let config = LinkResolverConfig::new().with_url_charset("us-ascii");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_template() {
        let config = LinkResolverConfig::new().with_mapping("tcm:1-5-8", "");
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let config = LinkResolverConfig::from_lookup(lookup_from(&[
            ("LINKCACHE_SCHEMA_KEY", "id"),
            ("LINKCACHE_ENCODE_URL", "false"),
            ("LINKCACHE_CONTEXT_PATH", "/app"),
            ("LINKCACHE_URL_CHARSET", "US-ASCII"),
            (
                "LINKCACHE_SCHEMA_URL_MAPPINGS",
                r#"{"5":"/articles/%COMPONENTTITLE%"}"#,
            ),
        ]))
        .unwrap();

        assert_eq!(config.schema_key, SchemaKey::Id);
        assert!(!config.encode_url);
        assert_eq!(config.context_path.as_deref(), Some("/app"));
        assert_eq!(config.url_charset, "US-ASCII");
        assert_eq!(config.schema_to_url_mappings.len(), 1);
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let config = LinkResolverConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, LinkResolverConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let bad_bool =
            LinkResolverConfig::from_lookup(lookup_from(&[("LINKCACHE_ENCODE_URL", "maybe")]));
        assert!(matches!(bad_bool, Err(LinkError::Config(_))));

        let bad_json = LinkResolverConfig::from_lookup(lookup_from(&[(
            "LINKCACHE_SCHEMA_URL_MAPPINGS",
            "[not json",
        )]));
        assert!(matches!(bad_json, Err(LinkError::Config(_))));
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: LinkResolverConfig =
            serde_json::from_str(r#"{"schema_key":"id","context_path":"/x"}"#).unwrap();
        assert_eq!(config.schema_key, SchemaKey::Id);
        assert!(config.encode_url);
        assert_eq!(config.context_path.as_deref(), Some("/x"));
    }
}
