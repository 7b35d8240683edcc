use nest_archive::{ArchiveAddress, ArchiveError, ErrorKind};
use thiserror::Error;

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

/// Failure of a resolution or management operation.
///
/// [`ResolveError::NotFound`] is the only variant without an underlying cause
/// and the only one a search treats as "try the next candidate". Everything
/// else aborts the search and reaches the original caller unchanged.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{0}` not found")]
    NotFound(String),

    #[error("failed to read `{name}`: {source}")]
    Archive {
        name: String,
        #[source]
        source: ArchiveError,
    },

    #[error("malformed class `{name}` at {location}: {source}")]
    Malformed {
        name: String,
        location: ArchiveAddress,
        #[source]
        source: nest_classfile::Error,
    },

    #[error("{location} declares `{found}`, not `{name}`")]
    WrongName {
        name: String,
        location: ArchiveAddress,
        found: String,
    },

    #[error("{0} is already provided by another component")]
    DuplicateOrigin(ArchiveAddress),

    #[error("aggregator is already a component")]
    DuplicateComponent,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::NotFound(_) => ErrorKind::NotFound,
            // An entry that vanished from an already-indexed archive is a read
            // failure here, not an ordinary miss.
            ResolveError::Archive { source, .. } => match source.kind() {
                ErrorKind::NotFound => ErrorKind::IoFailure,
                kind => kind,
            },
            ResolveError::Malformed { .. } | ResolveError::WrongName { .. } => ErrorKind::Malformed,
            ResolveError::DuplicateOrigin(_) | ResolveError::DuplicateComponent => {
                ErrorKind::DuplicateOrigin
            }
            ResolveError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    pub(crate) fn archive(name: impl Into<String>, source: ArchiveError) -> Self {
        match source {
            ArchiveError::InvalidConfiguration(msg) => ResolveError::InvalidConfiguration(msg),
            source => ResolveError::Archive {
                name: name.into(),
                source,
            },
        }
    }
}
