//! Cache keys for resolved links.
//!
//! Keys are built from parsed identifiers only, so a key can never be formed
//! for an identifier that could not also be scoped for invalidation.

use std::fmt;

use linkcache_core::{ItemScope, TcmUri};

/// Prefix of keys for links resolved without page context.
pub const COMPONENT_PREFIX: &str = "CL-";

/// Prefix of keys for links resolved from a page.
pub const PAGE_PREFIX: &str = "CLP-";

/// Separator between component and page in page-qualified keys. Never
/// produced by [`TcmUri`]'s display form.
const PAGE_SEPARATOR: char = '|';

/// Cache key for a resolved link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkCacheKey {
    inner: KeyInner,
    rendered: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyInner {
    Component(TcmUri),
    ComponentOnPage { component: TcmUri, page: TcmUri },
}

impl LinkCacheKey {
    /// Key for `CL-{component}`.
    pub fn component(component: TcmUri) -> Self {
        Self {
            rendered: format!("{}{}", COMPONENT_PREFIX, component),
            inner: KeyInner::Component(component),
        }
    }

    /// Key for `CLP-{component}|{page}`.
    pub fn component_on_page(component: TcmUri, page: TcmUri) -> Self {
        Self {
            rendered: format!("{}{}{}{}", PAGE_PREFIX, component, PAGE_SEPARATOR, page),
            inner: KeyInner::ComponentOnPage { component, page },
        }
    }

    pub fn component_uri(&self) -> TcmUri {
        match self.inner {
            KeyInner::Component(component) => component,
            KeyInner::ComponentOnPage { component, .. } => component,
        }
    }

    pub fn page_uri(&self) -> Option<TcmUri> {
        match self.inner {
            KeyInner::Component(_) => None,
            KeyInner::ComponentOnPage { page, .. } => Some(page),
        }
    }

    /// Invalidation scope: always the component's, never the page's.
    pub fn scope(&self) -> ItemScope {
        self.component_uri().scope()
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Parse a rendered key back into its parts.
    pub fn decode(raw: &str) -> Option<Self> {
        if let Some(rest) = raw.strip_prefix(PAGE_PREFIX) {
            let (component, page) = rest.split_once(PAGE_SEPARATOR)?;
            let key = Self::component_on_page(
                TcmUri::parse(component).ok()?,
                TcmUri::parse(page).ok()?,
            );
            return (key.rendered == raw).then_some(key);
        }
        let component = raw.strip_prefix(COMPONENT_PREFIX)?;
        let key = Self::component(TcmUri::parse(component).ok()?);
        (key.rendered == raw).then_some(key)
    }
}

impl fmt::Display for LinkCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for LinkCacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}
