use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::sync::Arc;

use crate::address::ArchiveAddress;
use crate::error::{ArchiveError, Result};
use crate::stream::next_entry;

/// A reopenable handle to one byte range inside a (possibly nested) archive.
///
/// Every locator knows its [`ArchiveAddress`]; how it gets back to the bytes
/// depends on how it was created:
///
/// - *direct*: walk the address by entry name ([`ArchiveAddress::open`]).
/// - *ordinal*: reopen the base locator and skip `position` entries. This only
///   holds against the same archive bytes that were indexed; if the entry at
///   that position has a different name the open fails with `NotFound`.
/// - *inline*: return bytes captured at index time. Never touches the archive
///   and never fails.
#[derive(Clone)]
pub struct Locator {
    address: ArchiveAddress,
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Direct,
    Ordinal { base: Arc<Locator>, position: usize },
    Inline { bytes: Arc<[u8]> },
}

impl Locator {
    pub fn direct(address: ArchiveAddress) -> Self {
        Self {
            address,
            repr: Repr::Direct,
        }
    }

    /// Names `entry` by its sequential position inside the archive `base`.
    pub fn ordinal(base: Arc<Locator>, entry: &str, position: usize) -> Result<Self> {
        validate_entry(entry)?;
        Ok(Self {
            address: base.address.join(entry),
            repr: Repr::Ordinal { base, position },
        })
    }

    /// Captures `bytes` as the content of `entry` inside `base`.
    pub fn inline(base: &ArchiveAddress, entry: &str, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        validate_entry(entry)?;
        Ok(Self {
            address: base.join(entry),
            repr: Repr::Inline {
                bytes: bytes.into(),
            },
        })
    }

    pub fn address(&self) -> &ArchiveAddress {
        &self.address
    }

    /// Entry name inside the enclosing archive; `None` for a direct locator on
    /// a plain file.
    pub fn entry_name(&self) -> Option<&str> {
        self.address.entry_name()
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.repr, Repr::Inline { .. })
    }

    pub fn position(&self) -> Option<usize> {
        match &self.repr {
            Repr::Ordinal { position, .. } => Some(*position),
            Repr::Direct | Repr::Inline { .. } => None,
        }
    }

    /// Captured bytes of an inline locator.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::Inline { bytes } => Some(bytes),
            Repr::Direct | Repr::Ordinal { .. } => None,
        }
    }

    /// Opens an independent stream over this locator's bytes.
    ///
    /// Each call reopens the underlying file, so concurrent opens never share a
    /// handle.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.repr {
            Repr::Direct => self.address.open(),
            Repr::Inline { bytes } => Ok(Box::new(Cursor::new(bytes.clone()))),
            Repr::Ordinal { .. } => Ok(Box::new(Cursor::new(self.read_all()?))),
        }
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        if let Repr::Inline { bytes } = &self.repr {
            return Ok(bytes.to_vec());
        }
        self.with_reader(|reader| {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|err| ArchiveError::read(&self.address, err))?;
            Ok(bytes)
        })
    }

    /// Streams this locator's bytes into `out`.
    pub fn copy_to(&self, out: &mut dyn Write) -> Result<u64> {
        self.with_reader(|reader| {
            io::copy(reader, &mut *out).map_err(|err| ArchiveError::read(&self.address, err))
        })
    }

    /// Runs `f` over a stream positioned at the start of this locator's bytes.
    ///
    /// Nested ordinal locators replay every enclosing archive in a single
    /// streaming pass; nothing above the innermost entry is buffered.
    pub fn with_reader<T>(&self, mut f: impl FnMut(&mut dyn Read) -> Result<T>) -> Result<T> {
        self.visit(&mut |mut reader: &mut dyn BufRead| f(&mut reader))
    }

    pub(crate) fn visit<T>(&self, f: &mut dyn FnMut(&mut dyn BufRead) -> Result<T>) -> Result<T> {
        match &self.repr {
            Repr::Direct => self.address.visit(f),
            Repr::Inline { bytes } => f(&mut Cursor::new(&bytes[..])),
            Repr::Ordinal { base, position } => {
                let archive = base.address();
                let expected = self.entry_name().unwrap_or_default();
                base.visit(&mut |reader: &mut dyn BufRead| {
                    for _ in 0..*position {
                        match next_entry(reader, archive)? {
                            Some(skipped) => skipped.finish(archive)?,
                            None => return Err(ArchiveError::not_found(archive, expected)),
                        }
                    }

                    let next = next_entry(reader, archive)?;
                    let Some(mut entry) = next else {
                        return Err(ArchiveError::not_found(archive, expected));
                    };
                    if entry.name() != expected {
                        tracing::debug!(
                            archive = %archive,
                            position = *position,
                            expected,
                            found = entry.name(),
                            "ordinal position no longer names the indexed entry"
                        );
                        return Err(ArchiveError::not_found(archive, expected));
                    }
                    let mut content = BufReader::new(&mut entry);
                    f(&mut content)
                })
            }
        }
    }
}

fn validate_entry(entry: &str) -> Result<()> {
    if entry.is_empty() {
        return Err(ArchiveError::InvalidConfiguration(
            "entry name must not be empty".to_owned(),
        ));
    }
    Ok(())
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Locator");
        s.field("address", &self.address.to_string());
        match &self.repr {
            Repr::Direct => s.field("kind", &"direct"),
            Repr::Ordinal { position, .. } => s.field("position", position),
            Repr::Inline { bytes } => s.field("inline_len", &bytes.len()),
        };
        s.finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address, f)
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Locator {}
