//! Error types for sightline extraction and its restart stream.

use std::error::Error;
use std::fmt;
use std::io;

use skewer_comm::CommError;
use skewer_core::ConfigError;
use skewer_io::OutputError;
use skewer_store::StoreError;

/// Errors raised while decoding or encoding the restart stream.
#[derive(Debug)]
pub enum RestartError {
    /// The underlying reader or writer failed, including truncated input.
    Io(io::Error),
    /// The stream does not start with the sightline label.
    BadLabel {
        /// The label found, with trailing NULs removed.
        found: String,
    },
    /// The block length differs from the fixed configuration size.
    BadLength {
        /// The expected block length in bytes.
        expected: u64,
        /// The length recorded in the stream.
        found: u64,
    },
    /// A value does not fit its fixed-width slot.
    OutOfRange {
        /// The slot name.
        field: &'static str,
    },
    /// The stored basename is not valid UTF-8.
    InvalidBasename,
    /// The stored total disagrees with the per-plane counts.
    InconsistentTotal {
        /// The total recorded in the stream.
        stored: i32,
        /// The sum of the per-plane counts.
        computed: i64,
    },
}

impl fmt::Display for RestartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadLabel { found } => {
                write!(f, "restart label mismatch: expected 'losparams', found '{found}'")
            }
            Self::BadLength { expected, found } => {
                write!(f, "restart block is {found} bytes, expected {expected}")
            }
            Self::OutOfRange { field } => write!(f, "value of '{field}' does not fit the restart block"),
            Self::InvalidBasename => write!(f, "restart basename is not valid UTF-8"),
            Self::InconsistentTotal { stored, computed } => write!(
                f,
                "restart total {stored} disagrees with per-plane counts summing to {computed}"
            ),
        }
    }
}

impl Error for RestartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RestartError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors raised by a sightline pass.
#[derive(Debug)]
pub enum LosError {
    /// A configuration fault.
    Config(ConfigError),
    /// Writing the output file failed.
    Output(OutputError),
    /// A collective failed.
    Comm(CommError),
    /// The restart stream could not be read or written.
    Restart(RestartError),
    /// The copying pass found a different number of matches than the
    /// counting pass.
    Consistency {
        /// Index of the sightline.
        sightline: usize,
        /// Matches found by the counting pass.
        counted: u64,
        /// Matches copied by the second pass.
        copied: u64,
    },
}

impl fmt::Display for LosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Output(e) => write!(f, "output error: {e}"),
            Self::Comm(e) => write!(f, "communication error: {e}"),
            Self::Restart(e) => write!(f, "restart error: {e}"),
            Self::Consistency {
                sightline,
                counted,
                copied,
            } => write!(
                f,
                "sightline {sightline}: counted {counted} particles but copied {copied}"
            ),
        }
    }
}

impl Error for LosError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Output(e) => Some(e),
            Self::Comm(e) => Some(e),
            Self::Restart(e) => Some(e),
            Self::Consistency { .. } => None,
        }
    }
}

impl From<ConfigError> for LosError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<OutputError> for LosError {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

impl From<StoreError> for LosError {
    fn from(e: StoreError) -> Self {
        Self::Output(OutputError::Store(e))
    }
}

impl From<CommError> for LosError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<RestartError> for LosError {
    fn from(e: RestartError) -> Self {
        Self::Restart(e)
    }
}
