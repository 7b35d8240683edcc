//! Addressing and indexing for archives nested inside archives.
//!
//! Jars are read strictly in stream order: an entry can only be reached by
//! replaying the archive from its first local header. This crate therefore
//! provides three pieces:
//!
//! - [`ArchiveAddress`]: the `archive://<base>!/<entry>[!/<entry>...]` syntax
//!   naming a byte range at any nesting depth, and the name-driven walk that
//!   opens it.
//! - [`Locator`]: an opaque handle that can reopen one entry later, either by
//!   replaying its parent to a recorded ordinal position or from bytes captured
//!   while indexing.
//! - [`ArchiveIndex`]: the result of a single pass over an archive stream,
//!   including indices for nested archives discovered along the way.

mod address;
mod error;
mod index;
mod locator;
mod stream;

pub use crate::address::{ensure_scheme, ArchiveAddress, SCHEME, SEPARATOR};
pub use crate::error::{ArchiveError, ErrorKind, Result};
pub use crate::index::{ArchiveIndex, IndexOptions, IndexStats};
pub use crate::locator::Locator;
