//! linkcache Test Utilities
//!
//! Shared test infrastructure for the linkcache workspace:
//! - Mock link providers with call counting, failure injection and gating
//! - Proptest generators for identifiers and references
//! - Fixtures for common resolution scenarios

// Re-export core types for convenience
pub use linkcache_core::{
    ContentReference, ItemScope, LinkError, LinkProvider, LinkResolverConfig, LinkResult,
    PageReference, SchemaDescriptor, SchemaKey, TcmUri,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// Holds backend calls until the test releases them.
///
/// Every call gated by this signals [`CallGate::wait_started`] and then waits
/// for a permit from [`CallGate::release`].
#[derive(Debug)]
pub struct CallGate {
    started: Notify,
    permits: Semaphore,
}

impl CallGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            permits: Semaphore::new(0),
        })
    }

    /// Wait until at least one gated call has reached the gate.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let `n` gated calls proceed.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    async fn pass(&self) {
        self.started.notify_one();
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// In-memory [`LinkProvider`] for tests.
///
/// Page lookups fall back to the plain component link when no page-specific
/// link is registered.
#[derive(Debug, Default)]
pub struct MockLinkProvider {
    links: RwLock<HashMap<String, String>>,
    page_links: RwLock<HashMap<(String, String), String>>,
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Arc<CallGate>>,
}

impl MockLinkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(self, component_uri: impl Into<String>, url: impl Into<String>) -> Self {
        self.set_link(component_uri, url);
        self
    }

    pub fn with_page_link(
        self,
        component_uri: impl Into<String>,
        page_uri: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.page_links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((component_uri.into(), page_uri.into()), url.into());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every call at `gate` until released.
    pub fn with_gate(mut self, gate: Arc<CallGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replace the link for a component, e.g. to simulate a republish.
    pub fn set_link(&self, component_uri: impl Into<String>, url: impl Into<String>) {
        self.links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(component_uri.into(), url.into());
    }

    pub fn remove_link(&self, component_uri: &str) {
        self.links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(component_uri);
    }

    /// Make the next `n` calls fail with a backend error.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Hold a call for the configured delay and gate, then apply any
    /// injected failure.
    ///
    /// Callers read their answer before this, so a link changed while a call
    /// is held does not leak into that call's result.
    async fn enter(&self, component_uri: &str) -> LinkResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LinkError::backend(component_uri, "mock backend unavailable"));
        }
        Ok(())
    }

    fn link(&self, component_uri: &str) -> Option<String> {
        self.links
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_uri)
            .cloned()
    }

    fn page_link(&self, component_uri: &str, page_uri: &str) -> Option<String> {
        self.page_links
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(component_uri.to_string(), page_uri.to_string()))
            .cloned()
    }
}

#[async_trait]
impl LinkProvider for MockLinkProvider {
    async fn resolve_component(&self, component_uri: &str) -> LinkResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.link(component_uri);
        self.enter(component_uri).await?;
        Ok(answer)
    }

    async fn resolve_component_from_page(
        &self,
        component_uri: &str,
        page_uri: &str,
    ) -> LinkResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .page_link(component_uri, page_uri)
            .or_else(|| self.link(component_uri));
        self.enter(component_uri).await?;
        Ok(answer)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for linkcache types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_item_scope() -> impl Strategy<Value = ItemScope> {
        (0i32..100, 1i32..10_000).prop_map(|(p, i)| ItemScope::new(p, i))
    }

    /// Component, page or schema URIs, with and without versions.
    pub fn arb_tcm_uri() -> impl Strategy<Value = TcmUri> {
        (
            arb_item_scope(),
            prop_oneof![Just(16i32), Just(64), Just(8)],
            proptest::option::of(1i32..20),
        )
            .prop_map(|(scope, item_type, version)| {
                let uri = TcmUri::new(scope.publication_id, scope.item_id, item_type);
                match version {
                    Some(v) => uri.with_version(v),
                    None => uri,
                }
            })
    }

    pub fn arb_component_uri() -> impl Strategy<Value = TcmUri> {
        arb_item_scope().prop_map(|s| TcmUri::new(s.publication_id, s.item_id, 16))
    }

    pub fn arb_page_uri() -> impl Strategy<Value = TcmUri> {
        arb_item_scope().prop_map(|s| TcmUri::new(s.publication_id, s.item_id, 64))
    }

    /// Titles with spaces, punctuation and non-ASCII characters.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 _.,&éü-]{0,24}"
    }

    pub fn arb_content_reference() -> impl Strategy<Value = ContentReference> {
        (arb_component_uri(), arb_title(), arb_item_scope(), arb_title()).prop_map(
            |(uri, title, schema_scope, schema_title)| {
                let schema_uri =
                    TcmUri::new(schema_scope.publication_id, schema_scope.item_id, 8);
                ContentReference::new(uri.to_string())
                    .with_title(title)
                    .with_schema(SchemaDescriptor::new(schema_uri.to_string(), schema_title))
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built references and configurations.

    use super::*;

    pub const ARTICLE_URI: &str = "tcm:1-100";
    pub const ARTICLE_SCHEMA_URI: &str = "tcm:1-5-8";
    pub const HOME_PAGE_URI: &str = "tcm:1-200-64";

    pub fn article_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(ARTICLE_SCHEMA_URI, "Article")
    }

    /// The `tcm:1-100` article titled "My Story".
    pub fn article_reference() -> ContentReference {
        ContentReference::new(ARTICLE_URI)
            .with_title("My Story")
            .with_schema(article_schema())
    }

    pub fn media_reference(url: &str) -> ContentReference {
        article_reference().with_multimedia_url(url)
    }

    pub fn home_page() -> PageReference {
        PageReference::new(HOME_PAGE_URI)
    }

    /// Resolver config mapping the article schema to `/articles/{title}`.
    pub fn mapped_config() -> LinkResolverConfig {
        LinkResolverConfig::new()
            .with_schema_key(SchemaKey::Id)
            .with_mapping(ARTICLE_SCHEMA_URI, "/articles/%COMPONENTTITLE%")
    }

    /// Provider knowing the article, with a page-specific link on the home page.
    pub fn article_provider() -> MockLinkProvider {
        MockLinkProvider::new()
            .with_link(ARTICLE_URI, "/news/my-story.html")
            .with_page_link(ARTICLE_URI, HOME_PAGE_URI, "/home/my-story.html")
    }
}
