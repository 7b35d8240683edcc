use std::fmt;
use std::sync::Arc;

use nest_archive::Locator;

use crate::class::DefinedClass;
use crate::error::Result;

/// Something names can be delegated to: an [`Aggregator`](crate::Aggregator),
/// or the host runtime's own resolver.
pub trait ClassResolver: Send + Sync {
    fn resolve_class(&self, name: &str) -> Result<Arc<DefinedClass>>;

    /// Every locator this resolver can see for `path`, in preference order.
    fn find_resources(&self, _path: &str) -> Resources {
        Resources::empty()
    }
}

/// Lazily produced resource locators.
///
/// A `Resources` value is consumed once; repeat the lookup for a fresh
/// sequence.
pub struct Resources {
    inner: Box<dyn Iterator<Item = Locator> + Send>,
}

impl Resources {
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn new(iter: impl Iterator<Item = Locator> + Send + 'static) -> Self {
        Self {
            inner: Box::new(iter),
        }
    }

    #[must_use]
    pub fn chain(self, other: Resources) -> Self {
        Self::new(self.inner.chain(other.inner))
    }
}

impl Iterator for Resources {
    type Item = Locator;

    fn next(&mut self) -> Option<Locator> {
        self.inner.next()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources").finish_non_exhaustive()
    }
}

/// Name prefixes that are always answered by the host resolver.
///
/// `builtin` covers the runtime's standard namespaces; `internal` covers the
/// embedding framework's own names. Archives are never consulted for either.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedNamespaces {
    pub builtin: Vec<String>,
    pub internal: Vec<String>,
}

impl ReservedNamespaces {
    pub fn none() -> Self {
        Self {
            builtin: Vec::new(),
            internal: Vec::new(),
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.builtin
            .iter()
            .chain(&self.internal)
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl Default for ReservedNamespaces {
    fn default() -> Self {
        Self {
            builtin: ["java.", "javax.", "sun.", "jdk."]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            internal: Vec::new(),
        }
    }
}
