//! Error types for link resolution

use thiserror::Error;

/// Placeholder encoding errors.
///
/// These never abort a resolution; the affected placeholder is substituted
/// with an empty string instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Unsupported charset: {charset}")]
    UnsupportedCharset { charset: String },

    #[error("Value {value:?} is not representable in {charset}")]
    Unrepresentable { value: String, charset: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for link resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Invalid reference format {uri:?}: {reason}")]
    InvalidReferenceFormat { uri: String, reason: String },

    #[error("Link resolution backend failed for {uri}: {reason}")]
    ResolutionBackend { uri: String, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl LinkError {
    /// Shorthand for a malformed identifier.
    pub fn invalid_reference(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReferenceFormat {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a provider failure.
    pub fn backend(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResolutionBackend {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResolutionBackend { .. })
    }
}

/// Result type alias for link resolution operations.
pub type LinkResult<T> = Result<T, LinkError>;

// =============================================================================
// TESTS
// =============================================================================
