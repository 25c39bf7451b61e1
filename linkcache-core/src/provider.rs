//! Backend link provider trait.

use async_trait::async_trait;

use crate::LinkResult;

/// The expensive identifier-to-URL lookup against the delivery backend.
///
/// `Ok(None)` means the backend knows of no link for the component. Failures
/// must be reported as [`crate::LinkError::ResolutionBackend`]; timeouts and
/// retries are the implementation's own business.
#[async_trait]
pub trait LinkProvider: Send + Sync {
    /// Resolve a component link without page context.
    async fn resolve_component(&self, component_uri: &str) -> LinkResult<Option<String>>;

    /// Resolve a component link as seen from a specific page.
    async fn resolve_component_from_page(
        &self,
        component_uri: &str,
        page_uri: &str,
    ) -> LinkResult<Option<String>>;
}
