use std::fmt;
use std::sync::Arc;

use nest_archive::{ArchiveAddress, IndexOptions, Locator};
use parking_lot::{Mutex, RwLock};

use crate::class::DefinedClass;
use crate::error::{ResolveError, Result};
use crate::node::ResolutionNode;
use crate::resolver::{ClassResolver, ReservedNamespaces, Resources};
use crate::scope::NodeScope;

/// Held while the component graph changes, so that a cycle or duplicate check
/// and the insertion it guards cannot interleave with another insertion.
static TOPOLOGY: Mutex<()> = parking_lot::const_mutex(());

/// A composite resolver over root archives and other aggregators.
///
/// Cloning is cheap and every clone shares the same component list. No two
/// components, counted transitively, ever share an origin.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    parent: Option<Arc<dyn ClassResolver>>,
    reserved: ReservedNamespaces,
    options: IndexOptions,
    components: RwLock<Vec<Component>>,
}

#[derive(Clone, Debug)]
pub enum Component {
    Archive(Arc<ResolutionNode>),
    Aggregator(Aggregator),
}

impl Component {
    fn contains_origin(&self, origin: &ArchiveAddress) -> bool {
        match self {
            Component::Archive(node) => node.contains_origin(origin),
            Component::Aggregator(aggregator) => aggregator.contains_origin(origin),
        }
    }

    fn collect_origins(&self, out: &mut Vec<ArchiveAddress>) {
        match self {
            Component::Archive(node) => out.extend(node.origins()),
            Component::Aggregator(aggregator) => out.extend(aggregator.origins()),
        }
    }
}

#[derive(Default)]
pub struct AggregatorBuilder {
    parent: Option<Arc<dyn ClassResolver>>,
    reserved: ReservedNamespaces,
    options: IndexOptions,
}

impl AggregatorBuilder {
    /// Resolver asked before any component, and the only one asked for
    /// reserved names.
    pub fn parent(mut self, parent: Arc<dyn ClassResolver>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn reserved(mut self, reserved: ReservedNamespaces) -> Self {
        self.reserved = reserved;
        self
    }

    /// Options used to index added archives. `recursive` is overridden per
    /// [`Aggregator::add_archive`] call.
    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Aggregator {
        Aggregator {
            inner: Arc::new(Inner {
                parent: self.parent,
                reserved: self.reserved,
                options: self.options,
                components: RwLock::new(Vec::new()),
            }),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_parent(parent: Arc<dyn ClassResolver>) -> Self {
        Self::builder().parent(parent).build()
    }

    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    pub fn parent(&self) -> Option<&Arc<dyn ClassResolver>> {
        self.inner.parent.as_ref()
    }

    pub fn reserved(&self) -> &ReservedNamespaces {
        &self.inner.reserved
    }

    pub fn options(&self) -> &IndexOptions {
        &self.inner.options
    }

    /// Indexes the archive at `address` and appends it as a root component.
    ///
    /// Fails with `DuplicateOrigin` if the new subtree shares any origin with
    /// an existing component; the component list is then left unchanged.
    pub fn add_archive(
        &self,
        address: &ArchiveAddress,
        recursive: bool,
    ) -> Result<Arc<ResolutionNode>> {
        // Cheap rejection before paying for the index.
        if self.contains_origin(address) {
            return Err(ResolveError::DuplicateOrigin(address.clone()));
        }

        let options = IndexOptions {
            recursive,
            ..self.inner.options.clone()
        };
        let node = ResolutionNode::open(address, &options)?;
        let origins = node.origins();

        let _topology = TOPOLOGY.lock();
        let mut components = self.inner.components.write();
        if let Some(taken) = origins
            .iter()
            .find(|origin| components.iter().any(|c| c.contains_origin(origin)))
        {
            return Err(ResolveError::DuplicateOrigin(taken.clone()));
        }
        components.push(Component::Archive(node.clone()));
        drop(components);

        tracing::info!(
            archive = %address,
            nested = origins.len() - 1,
            recursive,
            "added archive"
        );
        Ok(node)
    }

    /// Appends another aggregator as a component.
    pub fn add_component(&self, other: &Aggregator) -> Result<()> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Err(ResolveError::InvalidConfiguration(
                "an aggregator cannot contain itself".to_owned(),
            ));
        }

        let _topology = TOPOLOGY.lock();
        if other.reaches(self) {
            return Err(ResolveError::InvalidConfiguration(
                "adding this aggregator would create a cycle".to_owned(),
            ));
        }
        let origins = other.origins();

        let mut components = self.inner.components.write();
        if components.iter().any(|c| match c {
            Component::Aggregator(existing) => existing.ptr_eq(other) || existing.reaches(other),
            Component::Archive(_) => false,
        }) {
            return Err(ResolveError::DuplicateComponent);
        }
        if let Some(taken) = origins
            .iter()
            .find(|origin| components.iter().any(|c| c.contains_origin(origin)))
        {
            return Err(ResolveError::DuplicateOrigin(taken.clone()));
        }
        components.push(Component::Aggregator(other.clone()));
        drop(components);

        tracing::info!(archives = origins.len(), "added aggregator component");
        Ok(())
    }

    /// Removes the root component whose origin is `address`. Its nodes, their
    /// cached definitions and captured bytes are released once no scope or
    /// caller still holds them.
    pub fn remove_archive(&self, address: &ArchiveAddress) -> bool {
        let removed = self.remove_where(|c| match c {
            Component::Archive(node) => node.origin() == address,
            Component::Aggregator(_) => false,
        });
        if removed {
            tracing::info!(archive = %address, "removed archive");
        }
        removed
    }

    pub fn remove_component(&self, other: &Aggregator) -> bool {
        let removed = self.remove_where(|c| match c {
            Component::Aggregator(nested) => nested.ptr_eq(other),
            Component::Archive(_) => false,
        });
        if removed {
            tracing::info!("removed aggregator component");
        }
        removed
    }

    /// Drops every component and returns how many there were.
    pub fn unload(&self) -> usize {
        let removed = std::mem::take(&mut *self.inner.components.write());
        if !removed.is_empty() {
            tracing::info!(components = removed.len(), "unloaded aggregator");
        }
        removed.len()
    }

    fn remove_where(&self, mut pred: impl FnMut(&Component) -> bool) -> bool {
        let mut components = self.inner.components.write();
        let before = components.len();
        components.retain(|c| !pred(c));
        components.len() != before
    }

    /// Snapshot of the components in insertion order.
    pub fn components(&self) -> Vec<Component> {
        self.inner.components.read().clone()
    }

    pub fn components_len(&self) -> usize {
        self.inner.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.components.read().is_empty()
    }

    /// Every origin provided by this aggregator, transitively.
    pub fn origins(&self) -> Vec<ArchiveAddress> {
        let mut out = Vec::new();
        for component in self.inner.components.read().iter() {
            component.collect_origins(&mut out);
        }
        out
    }

    pub fn contains_origin(&self, origin: &ArchiveAddress) -> bool {
        self.inner
            .components
            .read()
            .iter()
            .any(|c| c.contains_origin(origin))
    }

    fn ptr_eq(&self, other: &Aggregator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `target` is this aggregator or one of its nested components.
    fn reaches(&self, target: &Aggregator) -> bool {
        self.ptr_eq(target)
            || self.inner.components.read().iter().any(|c| match c {
                Component::Aggregator(nested) => nested.reaches(target),
                Component::Archive(_) => false,
            })
    }

    /// Resolves `name`: reserved names go only to the parent; everything else
    /// goes to the parent first and then to each component in insertion order.
    pub fn resolve_class(&self, name: &str) -> Result<Arc<DefinedClass>> {
        self.resolve_skipping(name, None)
    }

    pub(crate) fn resolve_skipping(
        &self,
        name: &str,
        skip: Option<&ResolutionNode>,
    ) -> Result<Arc<DefinedClass>> {
        if name.is_empty() {
            return Err(ResolveError::InvalidConfiguration(
                "class name must not be empty".to_owned(),
            ));
        }

        let result = self.resolve_ordered(name, skip);
        if let Err(err) = &result {
            if !err.is_not_found() {
                tracing::warn!(name, error = %err, "resolution aborted");
            }
        }
        result
    }

    fn resolve_ordered(
        &self,
        name: &str,
        skip: Option<&ResolutionNode>,
    ) -> Result<Arc<DefinedClass>> {
        if self.inner.reserved.is_reserved(name) {
            tracing::trace!(name, "reserved name, forwarding to parent");
            return match &self.inner.parent {
                Some(parent) => parent.resolve_class(name),
                None => Err(ResolveError::NotFound(name.to_owned())),
            };
        }

        if let Some(parent) = &self.inner.parent {
            match parent.resolve_class(name) {
                Err(err) if err.is_not_found() => {}
                found => return found,
            }
        }

        self.resolve_down(name, skip)
    }

    /// Searches components only, in insertion order. Root nodes are searched
    /// with the usual local-then-children rule; `skip` is a root that has
    /// already been searched.
    pub fn resolve_down(
        &self,
        name: &str,
        skip: Option<&ResolutionNode>,
    ) -> Result<Arc<DefinedClass>> {
        for component in self.components() {
            let found = match &component {
                Component::Archive(node) => {
                    if skip.is_some_and(|skip| std::ptr::eq(skip, Arc::as_ptr(node))) {
                        continue;
                    }
                    node.find_down(name, None)
                }
                Component::Aggregator(nested) => nested.resolve_down(name, skip),
            };
            match found {
                Err(err) if err.is_not_found() => {}
                found => return found,
            }
        }
        Err(ResolveError::NotFound(name.to_owned()))
    }

    /// Parent results first, then every component's in insertion order.
    /// Duplicates across components are kept.
    pub fn find_resources(&self, path: &str) -> Resources {
        self.find_resources_skipping(path, None)
    }

    /// The first locator [`find_resources`](Self::find_resources) would yield.
    pub fn find_resource(&self, path: &str) -> Option<Locator> {
        self.find_resources(path).next()
    }

    pub(crate) fn find_resources_skipping(
        &self,
        path: &str,
        skip: Option<Arc<ResolutionNode>>,
    ) -> Resources {
        let upstream = match &self.inner.parent {
            Some(parent) => parent.find_resources(path),
            None => Resources::empty(),
        };
        upstream.chain(self.resources_down(path, skip))
    }

    fn resources_down(&self, path: &str, skip: Option<Arc<ResolutionNode>>) -> Resources {
        let components = self.components();
        let path = path.to_owned();
        Resources::new(components.into_iter().flat_map(move |component| match component {
            Component::Archive(node) => {
                if skip.as_ref().is_some_and(|skip| Arc::ptr_eq(skip, &node)) {
                    Resources::empty()
                } else {
                    node.find_resources(&path)
                }
            }
            Component::Aggregator(nested) => nested.resources_down(&path, skip.clone()),
        }))
    }

    /// A scope rooted at the node with `origin`, searching upward through this
    /// aggregator once the node's own tree is exhausted.
    pub fn scope(&self, origin: &ArchiveAddress) -> Option<NodeScope> {
        let chain = self.chain_to(origin)?;
        Some(NodeScope::within(chain, self.clone()))
    }

    fn chain_to(&self, origin: &ArchiveAddress) -> Option<Vec<Arc<ResolutionNode>>> {
        for component in self.components() {
            match component {
                Component::Archive(node) => {
                    let mut chain = Vec::new();
                    if node.chain_to(origin, &mut chain) {
                        return Some(chain);
                    }
                }
                Component::Aggregator(nested) => {
                    if let Some(chain) = nested.chain_to(origin) {
                        return Some(chain);
                    }
                }
            }
        }
        None
    }

    /// Resolves `name` as the node with `origin` would, e.g. for a class that
    /// node defined referring to another.
    pub fn resolve_from(&self, origin: &ArchiveAddress, name: &str) -> Result<Arc<DefinedClass>> {
        let scope = self.scope(origin).ok_or_else(|| {
            ResolveError::InvalidConfiguration(format!("no component provides {origin}"))
        })?;
        scope.resolve_class(name)
    }
}

impl ClassResolver for Aggregator {
    fn resolve_class(&self, name: &str) -> Result<Arc<DefinedClass>> {
        Aggregator::resolve_class(self, name)
    }

    fn find_resources(&self, path: &str) -> Resources {
        Aggregator::find_resources(self, path)
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("components", &self.components_len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
