use std::fmt;
use std::sync::Arc;

use nest_archive::ArchiveAddress;
use nest_classfile::{binary_to_internal, ClassHeader};

use crate::error::{ResolveError, Result};

/// A compiled unit that has been located, read and accepted under its name.
///
/// Instances are handed out behind `Arc`; a node returns the same instance for
/// the same name for as long as the node lives, so identity comparisons with
/// [`Arc::ptr_eq`] are meaningful.
pub struct DefinedClass {
    name: String,
    header: ClassHeader,
    bytes: Arc<[u8]>,
    location: ArchiveAddress,
    defined_by: ArchiveAddress,
}

impl DefinedClass {
    /// Decodes `bytes` and checks that they declare `name`.
    ///
    /// `location` is where the bytes were read from; `defined_by` is the origin
    /// of the node (or host) accepting the definition.
    pub fn define(
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
        location: ArchiveAddress,
        defined_by: ArchiveAddress,
    ) -> Result<Self> {
        let bytes = bytes.into();
        let header = ClassHeader::parse(&bytes).map_err(|source| ResolveError::Malformed {
            name: name.to_owned(),
            location: location.clone(),
            source,
        })?;

        if header.this_class != binary_to_internal(name) {
            return Err(ResolveError::WrongName {
                name: name.to_owned(),
                location,
                found: header.binary_name(),
            });
        }

        Ok(Self {
            name: name.to_owned(),
            header,
            bytes,
            location,
            defined_by,
        })
    }

    /// Binary (dotted) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &ClassHeader {
        &self.header
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn location(&self) -> &ArchiveAddress {
        &self.location
    }

    /// Origin of the node that defined this class.
    pub fn defined_by(&self) -> &ArchiveAddress {
        &self.defined_by
    }
}

impl fmt::Debug for DefinedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinedClass")
            .field("name", &self.name)
            .field("location", &self.location.to_string())
            .field("defined_by", &self.defined_by.to_string())
            .field("len", &self.bytes.len())
            .finish()
    }
}
