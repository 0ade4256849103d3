//! Error types for collective communication.

use std::error::Error;
use std::fmt;

/// Errors raised by collective operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// Another rank failed and the collective was abandoned.
    Aborted {
        /// The rank whose failure aborted the run.
        by_rank: usize,
    },
    /// A root rank index outside `0..size`.
    InvalidRoot {
        /// The requested root.
        root: usize,
        /// The communicator size.
        size: usize,
    },
    /// The root of a broadcast supplied no value.
    MissingRootValue {
        /// The root rank.
        root: usize,
    },
    /// Ranks entered the same collective with different payload types.
    PayloadType {
        /// The rank whose payload could not be interpreted.
        rank: usize,
    },
    /// A rank contributed a segment whose length disagrees with the
    /// agreed layout.
    CountMismatch {
        /// The contributing rank.
        rank: usize,
        /// Count recorded in the layout.
        expected: u64,
        /// Count actually contributed.
        found: u64,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { by_rank } => write!(f, "collective aborted by failure of rank {by_rank}"),
            Self::InvalidRoot { root, size } => {
                write!(f, "root rank {root} out of range for {size} ranks")
            }
            Self::MissingRootValue { root } => {
                write!(f, "broadcast root {root} supplied no value")
            }
            Self::PayloadType { rank } => {
                write!(f, "payload of rank {rank} has an unexpected type")
            }
            Self::CountMismatch {
                rank,
                expected,
                found,
            } => write!(
                f,
                "rank {rank} contributed {found} elements, layout expects {expected}"
            ),
        }
    }
}

impl Error for CommError {}
