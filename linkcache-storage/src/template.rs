//! Static schema-to-URL mappings and placeholder substitution.

use std::borrow::Cow;

use linkcache_core::{
    ContentReference, EncodingError, LinkResolverConfig, SchemaDescriptor, SchemaKey, TcmUri,
};

pub const COMPONENT_URI: &str = "%COMPONENTURI%";
pub const COMPONENT_TITLE: &str = "%COMPONENTTITLE%";
pub const SCHEMA_URI: &str = "%SCHEMAURI%";
pub const SCHEMA_TITLE: &str = "%SCHEMATITLE%";

/// Find the URL template configured for `schema`.
///
/// In [`SchemaKey::Id`] mode the schema's numeric item id is tried first and
/// the full schema URI second, so tables keyed either way keep working.
pub fn find_url_mapping<'a>(
    config: &'a LinkResolverConfig,
    schema: &SchemaDescriptor,
) -> Option<&'a str> {
    let mappings = &config.schema_to_url_mappings;
    if mappings.is_empty() {
        return None;
    }
    let lookup = |key: &str| {
        if key.is_empty() {
            None
        } else {
            mappings.get(key).map(String::as_str)
        }
    };

    match config.schema_key {
        SchemaKey::Id => TcmUri::parse(&schema.id)
            .ok()
            .and_then(|uri| lookup(&uri.item_id().to_string()))
            .or_else(|| lookup(&schema.id)),
        SchemaKey::Title => lookup(&schema.title),
        SchemaKey::Uri => lookup(&schema.id),
    }
}

/// Substitute the four placeholders of `template` with values taken from
/// `reference`. A value that cannot be encoded is replaced by an empty string;
/// the rest of the template is still expanded.
///
/// The template is scanned once, left to right, so substituted values are
/// inserted literally even if they contain placeholder text.
pub fn expand_template(
    template: &str,
    reference: &ContentReference,
    config: &LinkResolverConfig,
) -> String {
    let substitutions = [
        (COMPONENT_URI, reference.id.as_str()),
        (COMPONENT_TITLE, reference.title.as_str()),
        (SCHEMA_URI, reference.schema.id.as_str()),
        (SCHEMA_TITLE, reference.schema.title.as_str()),
    ];

    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        expanded.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match substitutions
            .iter()
            .find(|(placeholder, _)| tail.starts_with(placeholder))
        {
            Some((placeholder, value)) => {
                let replacement = encode_value(value, config).unwrap_or_else(|e| {
                    tracing::warn!(
                        placeholder,
                        component = %reference.id,
                        error = %e,
                        "Placeholder value could not be encoded, substituting empty string"
                    );
                    Cow::Borrowed("")
                });
                expanded.push_str(&replacement);
                rest = &tail[placeholder.len()..];
            }
            None => {
                expanded.push('%');
                rest = &tail[1..];
            }
        }
    }
    expanded.push_str(rest);
    expanded
}

/// Percent-encode a placeholder value according to the configured charset.
pub fn encode_value<'v>(
    value: &'v str,
    config: &LinkResolverConfig,
) -> Result<Cow<'v, str>, EncodingError> {
    if !config.encode_url {
        return Ok(Cow::Borrowed(value));
    }
    let charset = config.url_charset.as_str();
    if charset.eq_ignore_ascii_case("UTF-8") {
        Ok(urlencoding::encode(value))
    } else if charset.eq_ignore_ascii_case("US-ASCII") {
        if value.is_ascii() {
            Ok(urlencoding::encode(value))
        } else {
            Err(EncodingError::Unrepresentable {
                value: value.to_string(),
                charset: charset.to_string(),
            })
        }
    } else {
        Err(EncodingError::UnsupportedCharset {
            charset: charset.to_string(),
        })
    }
}
