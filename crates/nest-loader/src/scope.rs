use std::fmt;
use std::sync::Arc;

use nest_archive::ArchiveAddress;

use crate::aggregator::Aggregator;
use crate::class::DefinedClass;
use crate::error::{ResolveError, Result};
use crate::node::ResolutionNode;
use crate::resolver::{ClassResolver, ReservedNamespaces, Resources};

/// Resolution as seen from one node inside a tree.
///
/// Holds the chain of nodes from a root down to the node in question. A
/// lookup searches the node's own subtree, then walks back up the chain,
/// asking each ancestor to search itself while skipping the child the request
/// came from, and finally asks whatever the root hangs off.
pub struct NodeScope {
    chain: Vec<Arc<ResolutionNode>>,
    reserved: ReservedNamespaces,
    upstream: Upstream,
}

enum Upstream {
    Aggregator(Aggregator),
    External(Arc<dyn ClassResolver>),
    Detached,
}

impl NodeScope {
    pub(crate) fn within(chain: Vec<Arc<ResolutionNode>>, aggregator: Aggregator) -> Self {
        debug_assert!(!chain.is_empty());
        Self {
            chain,
            reserved: aggregator.reserved().clone(),
            upstream: Upstream::Aggregator(aggregator),
        }
    }

    /// Scopes to the node with `origin` under a root that belongs to no
    /// aggregator. `parent`, if given, is asked once the tree is exhausted and
    /// answers reserved names directly.
    pub fn standalone(
        root: &Arc<ResolutionNode>,
        origin: &ArchiveAddress,
        parent: Option<Arc<dyn ClassResolver>>,
        reserved: ReservedNamespaces,
    ) -> Option<Self> {
        let mut chain = Vec::new();
        if !root.chain_to(origin, &mut chain) {
            return None;
        }
        let upstream = match parent {
            Some(parent) => Upstream::External(parent),
            None => Upstream::Detached,
        };
        Some(Self {
            chain,
            reserved,
            upstream,
        })
    }

    /// The node this scope resolves from.
    pub fn node(&self) -> &Arc<ResolutionNode> {
        &self.chain[self.chain.len() - 1]
    }

    pub fn root(&self) -> &Arc<ResolutionNode> {
        &self.chain[0]
    }

    /// Origins from the root down to this scope's node.
    pub fn path(&self) -> Vec<&ArchiveAddress> {
        self.chain.iter().map(|node| node.origin()).collect()
    }

    pub fn resolve_class(&self, name: &str) -> Result<Arc<DefinedClass>> {
        if name.is_empty() {
            return Err(ResolveError::InvalidConfiguration(
                "class name must not be empty".to_owned(),
            ));
        }
        if self.reserved.is_reserved(name) {
            return self.resolve_upstream(name);
        }

        match self.node().find_down(name, None) {
            Err(err) if err.is_not_found() => {}
            found => return found,
        }

        // Each ancestor skips the child the request just came out of.
        for pair in self.chain.windows(2).rev() {
            let (ancestor, came_from) = (&pair[0], &pair[1]);
            tracing::trace!(name, archive = %ancestor.origin(), "searching ancestor");
            match ancestor.find_down(name, Some(came_from.as_ref())) {
                Err(err) if err.is_not_found() => {}
                found => return found,
            }
        }

        self.resolve_upstream(name)
    }

    fn resolve_upstream(&self, name: &str) -> Result<Arc<DefinedClass>> {
        match &self.upstream {
            Upstream::Aggregator(aggregator) => {
                aggregator.resolve_skipping(name, Some(self.root().as_ref()))
            }
            Upstream::External(parent) => parent.resolve_class(name),
            Upstream::Detached => Err(ResolveError::NotFound(name.to_owned())),
        }
    }

    /// The node's subtree, then each ancestor without the branch already
    /// covered, then upstream.
    pub fn find_resources(&self, path: &str) -> Resources {
        let mut resources = self.node().find_resources(path);
        for pair in self.chain.windows(2).rev() {
            let (ancestor, covered) = (&pair[0], &pair[1]);
            resources =
                resources.chain(ancestor.find_resources_skipping(path, Some(covered.as_ref())));
        }
        let upstream = match &self.upstream {
            Upstream::Aggregator(aggregator) => {
                aggregator.find_resources_skipping(path, Some(self.root().clone()))
            }
            Upstream::External(parent) => parent.find_resources(path),
            Upstream::Detached => Resources::empty(),
        };
        resources.chain(upstream)
    }
}

impl ClassResolver for NodeScope {
    fn resolve_class(&self, name: &str) -> Result<Arc<DefinedClass>> {
        NodeScope::resolve_class(self, name)
    }

    fn find_resources(&self, path: &str) -> Resources {
        NodeScope::find_resources(self, path)
    }
}

impl fmt::Debug for NodeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path().iter().map(ToString::to_string).collect();
        let upstream = match self.upstream {
            Upstream::Aggregator(_) => "aggregator",
            Upstream::External(_) => "external",
            Upstream::Detached => "none",
        };
        f.debug_struct("NodeScope")
            .field("path", &path)
            .field("upstream", &upstream)
            .finish()
    }
}
