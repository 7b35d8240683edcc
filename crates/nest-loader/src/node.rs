use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nest_archive::{ArchiveAddress, ArchiveIndex, IndexOptions, Locator};
use nest_classfile::binary_to_internal;

use crate::cache::DefinitionCache;
use crate::class::DefinedClass;
use crate::error::{ResolveError, Result};
use crate::resolver::Resources;

/// One indexed archive together with the nodes of the archives nested in it.
///
/// The entry table and child list never change after construction; the only
/// mutable state is the per-name definition cache. Nodes point only
/// downward. Searching toward ancestors goes through a
/// [`NodeScope`](crate::NodeScope), which carries the ancestor chain
/// explicitly.
pub struct ResolutionNode {
    source: Arc<Locator>,
    entries: HashMap<String, Locator>,
    children: Vec<Arc<ResolutionNode>>,
    class_suffix: String,
    cache: DefinitionCache<Arc<DefinedClass>>,
}

impl ResolutionNode {
    /// Indexes the archive at `address` and builds the node tree for it.
    pub fn open(address: &ArchiveAddress, options: &IndexOptions) -> Result<Arc<Self>> {
        let index = ArchiveIndex::open(address, options)
            .map_err(|err| ResolveError::archive(address.to_string(), err))?;
        Ok(Self::from_index(index, &options.class_suffix))
    }

    pub fn from_index(index: ArchiveIndex, class_suffix: &str) -> Arc<Self> {
        let (source, entries, children) = index.into_parts();
        let children = children
            .into_iter()
            .map(|child| Self::from_index(child, class_suffix))
            .collect();
        Arc::new(Self {
            source,
            entries,
            children,
            class_suffix: class_suffix.to_owned(),
            cache: DefinitionCache::new(),
        })
    }

    /// The archive's own address; also the node's identity.
    pub fn origin(&self) -> &ArchiveAddress {
        self.source.address()
    }

    /// Children in the order their archives were encountered while indexing.
    pub fn children(&self) -> &[Arc<ResolutionNode>] {
        &self.children
    }

    pub fn entry(&self, path: &str) -> Option<&Locator> {
        self.entries.get(path)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry-table key for a binary class name, e.g. `a.b.C` -> `a/b/C.class`.
    pub fn class_entry(&self, name: &str) -> String {
        format!("{}{}", binary_to_internal(name), self.class_suffix)
    }

    /// The definition of `name` at this node, if one has completed.
    pub fn loaded_class(&self, name: &str) -> Option<Arc<DefinedClass>> {
        self.cache.peek(name)
    }

    /// Number of classes this node has defined.
    pub fn defined_count(&self) -> usize {
        self.cache.defined()
    }

    /// Defines `name` from this node's own entry table only.
    ///
    /// The cache is consulted first, so a name is materialized at most once
    /// per node no matter how many threads ask for it.
    pub fn define_local(&self, name: &str) -> Result<Arc<DefinedClass>> {
        if let Some(class) = self.cache.peek(name) {
            return Ok(class);
        }
        let key = self.class_entry(name);
        let Some(locator) = self.entries.get(&key) else {
            return Err(ResolveError::NotFound(name.to_owned()));
        };

        self.cache.get_or_define(name, || {
            tracing::trace!(name, location = %locator, "defining class");
            let bytes = locator
                .read_all()
                .map_err(|err| ResolveError::archive(name, err))?;
            let class = DefinedClass::define(
                name,
                bytes,
                locator.address().clone(),
                self.origin().clone(),
            )?;
            Ok(Arc::new(class))
        })
    }

    /// Local entries first, then each child except `skip` in insertion order,
    /// depth-first. Only a miss moves on to the next candidate.
    pub fn find_down(
        &self,
        name: &str,
        skip: Option<&ResolutionNode>,
    ) -> Result<Arc<DefinedClass>> {
        match self.define_local(name) {
            Err(err) if err.is_not_found() => {}
            found => return found,
        }

        for child in &self.children {
            if skip.is_some_and(|skip| std::ptr::eq(skip, Arc::as_ptr(child))) {
                continue;
            }
            match child.find_down(name, None) {
                Err(err) if err.is_not_found() => {}
                found => return found,
            }
        }

        tracing::trace!(name, archive = %self.origin(), "not found below node");
        Err(ResolveError::NotFound(name.to_owned()))
    }

    /// Every locator for `path` in this subtree: the local entry, then each
    /// child's results in insertion order.
    pub fn find_resources(self: &Arc<Self>, path: &str) -> Resources {
        self.find_resources_skipping(path, None)
    }

    pub(crate) fn find_resources_skipping(
        self: &Arc<Self>,
        path: &str,
        skip: Option<&ResolutionNode>,
    ) -> Resources {
        let local = self.entries.get(path).cloned();
        let children: Vec<_> = self
            .children
            .iter()
            .filter(|child| !skip.is_some_and(|skip| std::ptr::eq(skip, Arc::as_ptr(child))))
            .cloned()
            .collect();
        let path = path.to_owned();
        Resources::new(
            local.into_iter().chain(
                children
                    .into_iter()
                    .flat_map(move |child| child.find_resources(&path)),
            ),
        )
    }

    /// Origins of this node and every descendant, depth-first.
    pub fn origins(&self) -> Vec<ArchiveAddress> {
        let mut out = Vec::new();
        self.collect_origins(&mut out);
        out
    }

    fn collect_origins(&self, out: &mut Vec<ArchiveAddress>) {
        out.push(self.origin().clone());
        for child in &self.children {
            child.collect_origins(out);
        }
    }

    pub fn contains_origin(&self, origin: &ArchiveAddress) -> bool {
        self.origin() == origin || self.children.iter().any(|child| child.contains_origin(origin))
    }

    /// Pushes the path from `self` down to the node whose origin is `origin`.
    /// Leaves `chain` as it was and returns `false` if there is none.
    pub(crate) fn chain_to(
        self: &Arc<Self>,
        origin: &ArchiveAddress,
        chain: &mut Vec<Arc<ResolutionNode>>,
    ) -> bool {
        chain.push(self.clone());
        if self.origin() == origin {
            return true;
        }
        for child in &self.children {
            if child.chain_to(origin, chain) {
                return true;
            }
        }
        chain.pop();
        false
    }
}

impl fmt::Debug for ResolutionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionNode")
            .field("origin", &self.origin().to_string())
            .field("entries", &self.entries.len())
            .field("children", &self.children.len())
            .finish()
    }
}
