use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ArchiveError, Result};
use crate::stream::next_entry;

/// Prefix of the canonical nested form.
pub const SCHEME: &str = "archive://";

/// Delimiter between nesting levels.
pub const SEPARATOR: &str = "!/";

const FILE_SCHEME: &str = "file://";

/// Location of a byte range inside zero or more levels of nested archives.
///
/// The first component is a plain file; every following level names an entry
/// inside the archive produced by the previous one, outermost first:
///
/// ```text
/// archive:///deps/app.jar!/lib/inner.jar!/data/file.txt
/// ```
///
/// Two addresses are equal iff their base paths and levels are equal, so the
/// presence or absence of the scheme prefix does not affect identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveAddress {
    base: PathBuf,
    levels: Vec<String>,
}

impl ArchiveAddress {
    /// A direct (non-nested) address.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base: path.into(),
            levels: Vec::new(),
        }
    }

    /// Parses an address with or without the `archive://` prefix.
    pub fn parse(candidate: &str) -> Result<Self> {
        let trimmed = candidate.trim();
        let unprefixed = trimmed.strip_prefix(SCHEME).unwrap_or(trimmed);
        let unprefixed = unprefixed.strip_prefix(FILE_SCHEME).unwrap_or(unprefixed);

        let mut parts = unprefixed.split(SEPARATOR);
        let base = parts.next().unwrap_or_default();
        if base.is_empty() {
            return Err(ArchiveError::InvalidConfiguration(format!(
                "address `{candidate}` has no base location"
            )));
        }

        let mut levels = Vec::new();
        for level in parts {
            if level.is_empty() {
                return Err(ArchiveError::InvalidConfiguration(format!(
                    "address `{candidate}` contains an empty nesting level"
                )));
            }
            levels.push(level.to_owned());
        }

        Ok(Self {
            base: PathBuf::from(base),
            levels,
        })
    }

    /// The address of `entry` inside the archive named by `self`.
    #[must_use]
    pub fn join(&self, entry: &str) -> Self {
        let mut levels = self.levels.clone();
        levels.push(entry.to_owned());
        Self {
            base: self.base.clone(),
            levels,
        }
    }

    /// The enclosing archive, or `None` for a direct address.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.levels.split_last()?;
        Some(Self {
            base: self.base.clone(),
            levels: rest.to_vec(),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Name of the innermost entry, if nested.
    pub fn entry_name(&self) -> Option<&str> {
        self.levels.last().map(String::as_str)
    }

    pub fn is_nested(&self) -> bool {
        !self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Opens the bytes named by this address.
    ///
    /// Direct addresses stream straight from the file. Nested addresses are
    /// walked level by level and the innermost entry is returned as an owned
    /// buffer, since a streamed zip entry borrows every reader above it; use
    /// [`ArchiveAddress::copy_to`] or [`ArchiveAddress::with_reader`] to stream
    /// a large nested entry instead.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        if self.levels.is_empty() {
            let file = File::open(&self.base).map_err(|err| ArchiveError::io(self, err))?;
            return Ok(Box::new(BufReader::new(file)));
        }

        let bytes = self.read_all()?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.with_reader(|reader| {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|err| ArchiveError::read(self, err))?;
            Ok(bytes)
        })
    }

    /// Streams this address's bytes into `out` without buffering the entry.
    pub fn copy_to(&self, out: &mut dyn Write) -> Result<u64> {
        self.with_reader(|reader| {
            io::copy(reader, &mut *out).map_err(|err| ArchiveError::read(self, err))
        })
    }

    /// Runs `f` over a stream positioned at the start of this address's bytes.
    pub fn with_reader<T>(&self, mut f: impl FnMut(&mut dyn Read) -> Result<T>) -> Result<T> {
        self.visit(&mut |mut reader: &mut dyn BufRead| f(&mut reader))
    }

    pub(crate) fn visit<T>(&self, f: &mut dyn FnMut(&mut dyn BufRead) -> Result<T>) -> Result<T> {
        let outermost = Self::from_path(self.base.clone());
        let file = File::open(&self.base).map_err(|err| ArchiveError::io(&outermost, err))?;
        let mut reader = BufReader::new(file);
        match self.levels.split_first() {
            None => f(&mut reader),
            Some((level, rest)) => walk(&mut reader, &outermost, level, rest, f),
        }
    }
}

/// Scans forward through `reader` for `level`, then descends into the matching
/// entry's content for the remaining levels without reopening anything.
fn walk<T>(
    reader: &mut dyn BufRead,
    archive: &ArchiveAddress,
    level: &str,
    rest: &[String],
    f: &mut dyn FnMut(&mut dyn BufRead) -> Result<T>,
) -> Result<T> {
    loop {
        let next = next_entry(reader, archive)?;
        let Some(mut entry) = next else {
            return Err(ArchiveError::not_found(archive, level));
        };
        if entry.name() != level {
            entry.finish(archive)?;
            continue;
        }

        let mut content = BufReader::new(&mut entry);
        return match rest.split_first() {
            None => f(&mut content),
            Some((next_level, rest)) => {
                walk(&mut content, &archive.join(level), next_level, rest, f)
            }
        };
    }
}

/// Canonicalizes `candidate` into the `archive://<base>!/<entry>` form.
///
/// Already-prefixed input is returned unchanged, and a `file://` prefix is
/// folded into the scheme.
pub fn ensure_scheme(candidate: &str) -> String {
    if candidate.starts_with(SCHEME) {
        return candidate.to_owned();
    }
    match candidate.strip_prefix(FILE_SCHEME) {
        Some(rest) => format!("{SCHEME}{rest}"),
        None => format!("{SCHEME}{candidate}"),
    }
}

impl fmt::Display for ArchiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.levels.is_empty() {
            return write!(f, "{}", self.base.display());
        }
        write!(f, "{SCHEME}{}", self.base.display())?;
        for level in &self.levels {
            write!(f, "{SEPARATOR}{level}")?;
        }
        Ok(())
    }
}

impl FromStr for ArchiveAddress {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<PathBuf> for ArchiveAddress {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

impl From<&Path> for ArchiveAddress {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}
