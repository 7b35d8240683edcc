//! Name resolution over trees of nested archives.
//!
//! A [`ResolutionNode`] wraps one archive index and the nodes of the archives
//! nested in it. Looking a class up at a node checks the node's own entries,
//! then its children in the order they were indexed. An [`Aggregator`]
//! composes root nodes and other aggregators behind a single resolver and
//! asks its parent resolver before any component.
//!
//! Search results distinguish a plain miss ([`ResolveError::NotFound`]),
//! which moves on to the next candidate, from every other failure, which
//! aborts the search and reaches the caller unchanged.
//!
//! Each node defines a given name at most once; concurrent requests for the
//! same name share that single definition, and requests for different names
//! never wait on each other.

mod aggregator;
mod cache;
mod class;
mod error;
mod node;
mod resolver;
mod scope;

pub use crate::aggregator::{Aggregator, AggregatorBuilder, Component};
pub use crate::class::DefinedClass;
pub use crate::error::{ResolveError, Result};
pub use crate::node::ResolutionNode;
pub use crate::resolver::{ClassResolver, ReservedNamespaces, Resources};
pub use crate::scope::NodeScope;

pub use nest_archive::{ArchiveAddress, ErrorKind, IndexOptions, Locator};
