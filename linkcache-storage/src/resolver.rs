//! Link resolution engine.
//!
//! Resolution tries three strategies in order: an embedded media URL on the
//! reference, a static schema mapping, and finally the backend
//! [`LinkProvider`]. Only backend results are cached; the other two are pure
//! functions of the reference.
//!
//! Backend lookups are single-flight per cache key. A caller that finds the
//! entry expired takes the entry's refresh lock, re-checks, and only then
//! calls the provider. Callers queued on the same lock wake up to the fresh
//! value instead of issuing their own backend call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use linkcache_core::{
    ContentReference, LinkError, LinkProvider, LinkResolverConfig, LinkResult, PageReference,
    TcmUri,
};

use crate::cache::{LinkCacheKey, ScopedCache};
use crate::template::{expand_template, find_url_mapping};

/// Counters describing how links were resolved.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub resolutions: AtomicU64,
    pub embedded: AtomicU64,
    pub mapped: AtomicU64,
    pub cache_hits: AtomicU64,
    pub backend_calls: AtomicU64,
    pub backend_errors: AtomicU64,
}

impl ResolverMetrics {
    pub fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            embedded: self.embedded.load(Ordering::Relaxed),
            mapped: self.mapped.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of resolver metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverSnapshot {
    pub resolutions: u64,
    pub embedded: u64,
    pub mapped: u64,
    pub cache_hits: u64,
    pub backend_calls: u64,
    pub backend_errors: u64,
}

#[derive(Debug, Clone, Copy)]
enum Lookup<'a> {
    Component(&'a str),
    ComponentOnPage { component: &'a str, page: &'a str },
}

impl<'a> Lookup<'a> {
    fn component(&self) -> &'a str {
        match *self {
            Lookup::Component(component) => component,
            Lookup::ComponentOnPage { component, .. } => component,
        }
    }

    fn cache_key(&self) -> LinkResult<LinkCacheKey> {
        let component = TcmUri::parse(self.component())?;
        match *self {
            Lookup::Component(_) => Ok(LinkCacheKey::component(component)),
            Lookup::ComponentOnPage { page, .. } => Ok(LinkCacheKey::component_on_page(
                component,
                TcmUri::parse(page)?,
            )),
        }
    }
}

/// Resolve-with-cache engine.
///
/// Holds only shared handles, so it is cheap to clone and safe to call from
/// any number of tasks at once.
///
/// # Example
///
/// ```ignore
/// let engine = LinkResolutionEngine::new(cache, provider, LinkResolverConfig::default());
/// let url = engine.resolve(&reference, Some(&page)).await?;
/// ```
pub struct LinkResolutionEngine<C, P>
where
    C: ScopedCache<String>,
    P: LinkProvider,
{
    cache: Arc<C>,
    provider: Arc<P>,
    config: Arc<LinkResolverConfig>,
    metrics: Arc<ResolverMetrics>,
}

impl<C, P> LinkResolutionEngine<C, P>
where
    C: ScopedCache<String>,
    P: LinkProvider,
{
    /// Create an engine without validating the configuration.
    ///
    /// Trailing slashes on the context path are dropped so prefixes never
    /// produce `//`. Prefer [`Self::try_new`] for configuration read from
    /// outside the process.
    pub fn new(cache: Arc<C>, provider: Arc<P>, config: LinkResolverConfig) -> Self {
        Self {
            cache,
            provider,
            config: Arc::new(config),
            metrics: Arc::new(ResolverMetrics::default()),
        }
    }

    /// Create an engine after validating the configuration.
    pub fn try_new(cache: Arc<C>, provider: Arc<P>, config: LinkResolverConfig) -> LinkResult<Self> {
        config.validate()?;
        Ok(Self::new(cache, provider, config))
    }

    pub fn config(&self) -> &LinkResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn metrics(&self) -> ResolverSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve the link for `reference`, optionally as seen from `page`.
    ///
    /// Returns an empty string when the backend knows no link. The configured
    /// context path is prepended to non-empty results.
    pub async fn resolve(
        &self,
        reference: &ContentReference,
        page: Option<&PageReference>,
    ) -> LinkResult<String> {
        self.metrics.resolutions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            component = %reference.id,
            page = page.map(|p| p.id.as_str()),
            "Resolving link"
        );

        let resolved = if let Some(url) = reference.embedded_url() {
            self.metrics.embedded.fetch_add(1, Ordering::Relaxed);
            url.to_string()
        } else if let Some(template) = find_url_mapping(&self.config, &reference.schema) {
            self.metrics.mapped.fetch_add(1, Ordering::Relaxed);
            expand_template(template, reference, &self.config)
        } else {
            let lookup = match page {
                Some(page) => Lookup::ComponentOnPage {
                    component: &reference.id,
                    page: &page.id,
                },
                None => Lookup::Component(&reference.id),
            };
            let url = self.resolve_cached(lookup).await?;
            if url.is_empty() {
                tracing::debug!(component = %reference.id, "No link available for component");
            }
            url
        };

        Ok(self.with_context_path(resolved))
    }

    /// Resolve a component URI through the cache and backend only.
    ///
    /// No context path is applied.
    pub async fn resolve_uri(&self, component_uri: &str) -> LinkResult<String> {
        self.resolve_cached(Lookup::Component(component_uri)).await
    }

    /// Resolve a component URI from a page through the cache and backend only.
    ///
    /// No context path is applied.
    pub async fn resolve_uri_on_page(
        &self,
        component_uri: &str,
        page_uri: &str,
    ) -> LinkResult<String> {
        self.resolve_cached(Lookup::ComponentOnPage {
            component: component_uri,
            page: page_uri,
        })
        .await
    }

    async fn resolve_cached(&self, lookup: Lookup<'_>) -> LinkResult<String> {
        let key = lookup.cache_key()?;
        let entry = self.cache.load(key.as_str());

        if let Some(url) = entry.valid_payload() {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, url = %url, "Returning link from cache");
            return Ok(url);
        }

        let _refresh = entry.lock_refresh().await;
        if let Some(url) = entry.valid_payload() {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, url = %url, "Link refreshed by concurrent resolver");
            return Ok(url);
        }

        // Tag the entry before calling out, so an invalidation that arrives
        // during the backend call reaches it and bumps the epoch.
        let epoch = entry.epoch();
        self.cache.store(key.as_str(), Arc::clone(&entry), key.scope());

        self.metrics.backend_calls.fetch_add(1, Ordering::Relaxed);
        let resolved = match lookup {
            Lookup::Component(component) => self.provider.resolve_component(component).await,
            Lookup::ComponentOnPage { component, page } => {
                self.provider
                    .resolve_component_from_page(component, page)
                    .await
            }
        };

        let url = match resolved {
            Ok(url) => url.unwrap_or_default(),
            Err(e) => {
                self.metrics.backend_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(key = %key, error = %e, "Link resolution backend failed");
                return Err(as_backend_error(lookup.component(), e));
            }
        };

        if entry.refresh(url.clone(), epoch) {
            tracing::debug!(key = %key, url = %url, "Added link to cache");
        } else {
            tracing::debug!(
                key = %key,
                "Entry invalidated during resolution, leaving it expired"
            );
        }
        Ok(url)
    }

    fn with_context_path(&self, url: String) -> String {
        let prefix = self
            .config
            .effective_context_path()
            .map(|p| p.trim_end_matches('/'))
            .filter(|p| !p.is_empty());
        match prefix {
            Some(prefix) if !url.is_empty() => format!("{}{}", prefix, url),
            _ => url,
        }
    }
}

impl<C, P> Clone for LinkResolutionEngine<C, P>
where
    C: ScopedCache<String>,
    P: LinkProvider,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            provider: Arc::clone(&self.provider),
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

fn as_backend_error(component: &str, err: LinkError) -> LinkError {
    match err {
        LinkError::ResolutionBackend { .. } => err,
        other => LinkError::backend(component, other.to_string()),
    }
}
