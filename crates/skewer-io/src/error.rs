//! Error types for structured output and input.

use std::error::Error;
use std::fmt;

use skewer_comm::CommError;
use skewer_core::ConfigError;
use skewer_store::StoreError;

use crate::kind::PartKind;

/// Errors raised while writing or reading structured files.
///
/// `Clone` so a failure detected on the root can be broadcast and
/// reported identically on every rank.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputError {
    /// A configuration fault (bad field description, bad parameters).
    Config(ConfigError),
    /// The container backend failed.
    Store(StoreError),
    /// A collective failed.
    Comm(CommError),
    /// A compulsory field is absent from an input file.
    MissingCompulsory {
        /// The field name.
        field: String,
        /// The group searched.
        group: String,
    },
    /// Two storages were supplied for the same particle kind.
    DuplicateKind {
        /// The repeated kind.
        kind: PartKind,
    },
    /// An input file is structurally wrong.
    InvalidFile {
        /// The file path.
        path: String,
        /// Description of the problem.
        reason: String,
    },
    /// The XDMF companion could not be written.
    Xmf {
        /// The companion path.
        path: String,
        /// The underlying I/O error.
        detail: String,
    },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Store(e) => write!(f, "storage error: {e}"),
            Self::Comm(e) => write!(f, "communication error: {e}"),
            Self::MissingCompulsory { field, group } => {
                write!(f, "compulsory field '{field}' not found in {group}")
            }
            Self::DuplicateKind { kind } => {
                write!(f, "particle kind {kind:?} supplied more than once")
            }
            Self::InvalidFile { path, reason } => write!(f, "invalid file {path}: {reason}"),
            Self::Xmf { path, detail } => write!(f, "cannot write XMF file {path}: {detail}"),
        }
    }
}

impl Error for OutputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Comm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for OutputError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StoreError> for OutputError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<CommError> for OutputError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}
