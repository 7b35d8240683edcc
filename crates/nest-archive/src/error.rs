use std::fmt;
use std::io;

use thiserror::Error;

use crate::address::ArchiveAddress;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// Coarse failure classification shared by every layer of the resolver.
///
/// Only [`ErrorKind::NotFound`] is recoverable during a search; every other
/// kind aborts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Malformed,
    IoFailure,
    DuplicateOrigin,
    InvalidConfiguration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Malformed => "malformed",
            ErrorKind::IoFailure => "i/o failure",
            ErrorKind::DuplicateOrigin => "duplicate origin",
            ErrorKind::InvalidConfiguration => "invalid configuration",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("entry `{entry}` not found in {archive}")]
    NotFound {
        archive: ArchiveAddress,
        entry: String,
    },
    #[error("malformed archive {archive}: {reason}")]
    Malformed {
        archive: ArchiveAddress,
        reason: String,
    },
    #[error("failed to read {archive}: {source}")]
    Io {
        archive: ArchiveAddress,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::NotFound { .. } => ErrorKind::NotFound,
            ArchiveError::Malformed { .. } => ErrorKind::Malformed,
            ArchiveError::Io { .. } => ErrorKind::IoFailure,
            ArchiveError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    pub(crate) fn not_found(archive: &ArchiveAddress, entry: impl Into<String>) -> Self {
        ArchiveError::NotFound {
            archive: archive.clone(),
            entry: entry.into(),
        }
    }

    pub(crate) fn io(archive: &ArchiveAddress, source: io::Error) -> Self {
        ArchiveError::Io {
            archive: archive.clone(),
            source,
        }
    }

    pub(crate) fn malformed(archive: &ArchiveAddress, reason: impl Into<String>) -> Self {
        ArchiveError::Malformed {
            archive: archive.clone(),
            reason: reason.into(),
        }
    }

    /// Classifies a failure while reading archive content. Truncated input and
    /// undecodable deflate data are malformed archives; anything else is I/O.
    pub(crate) fn read(archive: &ArchiveAddress, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput => Self::malformed(archive, source.to_string()),
            _ => Self::io(archive, source),
        }
    }
}
