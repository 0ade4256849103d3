//! Error types for container storage.

use std::error::Error;
use std::fmt;

/// Errors raised by container backends.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreError {
    /// A container, group, dataset or attribute does not exist.
    NotFound {
        /// Path of the missing object (attribute names are appended
        /// after `@`).
        path: String,
    },
    /// A group or dataset already exists at this path.
    AlreadyExists {
        /// The conflicting path.
        path: String,
    },
    /// The container was opened read-only.
    ReadOnly {
        /// The container path.
        path: String,
    },
    /// A path names a group where a dataset was expected, or vice versa.
    WrongKind {
        /// The offending path.
        path: String,
        /// What was expected, e.g. `"dataset"`.
        expected: &'static str,
    },
    /// A hyperslab extends past the end of its dataset.
    OutOfBounds {
        /// Dataset path.
        path: String,
        /// First row of the hyperslab.
        offset: u64,
        /// Rows in the hyperslab.
        rows: u64,
        /// Rows in the dataset.
        len: u64,
    },
    /// A buffer is not a whole number of rows.
    RaggedBuffer {
        /// Dataset path.
        path: String,
        /// Buffer length in bytes.
        bytes: usize,
        /// Bytes per row.
        row_bytes: usize,
    },
    /// A chunk failed its checksum on read.
    ChecksumMismatch {
        /// Dataset path.
        path: String,
        /// Index of the corrupt chunk.
        chunk: usize,
    },
    /// A dataset layout is structurally invalid.
    InvalidLayout {
        /// Description of the problem.
        reason: String,
    },
    /// The underlying library reported an error.
    Backend {
        /// The library's message.
        detail: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "no such object: {path}"),
            Self::AlreadyExists { path } => write!(f, "object already exists: {path}"),
            Self::ReadOnly { path } => write!(f, "container {path} is open read-only"),
            Self::WrongKind { path, expected } => write!(f, "{path} is not a {expected}"),
            Self::OutOfBounds {
                path,
                offset,
                rows,
                len,
            } => write!(
                f,
                "hyperslab [{offset}, {}) outside dataset {path} of {len} rows",
                offset + rows
            ),
            Self::RaggedBuffer {
                path,
                bytes,
                row_bytes,
            } => write!(
                f,
                "buffer of {bytes} bytes is not a whole number of {row_bytes}-byte rows of {path}"
            ),
            Self::ChecksumMismatch { path, chunk } => {
                write!(f, "checksum mismatch in chunk {chunk} of {path}")
            }
            Self::InvalidLayout { reason } => write!(f, "invalid dataset layout: {reason}"),
            Self::Backend { detail } => write!(f, "storage backend error: {detail}"),
        }
    }
}

impl Error for StoreError {}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for StoreError {
    fn from(e: hdf5::Error) -> Self {
        Self::Backend {
            detail: e.to_string(),
        }
    }
}
