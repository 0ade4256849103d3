//! Configuration errors.
//!
//! Every variant here is a configuration fault: malformed or missing
//! parameters, inconsistent field catalogs, or unit systems that cannot
//! be used for conversion. None of them is retried.

use std::error::Error;
use std::fmt;

/// Errors detected while building or validating configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A compulsory runtime parameter is absent.
    MissingParameter {
        /// Fully qualified key, e.g. `"LineOfSight:basename"`.
        key: String,
    },
    /// A runtime parameter is present but cannot be interpreted.
    InvalidParameter {
        /// Fully qualified key.
        key: String,
        /// The raw value found.
        value: String,
        /// What was expected.
        reason: String,
    },
    /// A unit system has a non-positive or non-finite base magnitude.
    InvalidUnitSystem {
        /// Description of the offending magnitude.
        reason: String,
    },
    /// Two fields with the same name were added to one catalog.
    DuplicateField {
        /// The repeated name.
        name: String,
    },
    /// A catalog exceeded its configured upper bound.
    TooManyFields {
        /// The configured bound.
        limit: usize,
    },
    /// A field descriptor is structurally invalid.
    InvalidField {
        /// The field name (may be empty).
        name: String,
        /// Description of the problem.
        reason: String,
    },
    /// A field is about to be written without a human-readable description.
    EmptyDescription {
        /// The field name.
        name: String,
    },
    /// A field has no setter but was asked to receive data.
    ReadOnlyField {
        /// The field name.
        name: String,
    },
    /// An integer field would need a non-unit conversion factor.
    IntegerConversion {
        /// The field name.
        name: String,
        /// The conversion factor that would have been applied.
        factor: f64,
    },
    /// Any other structural configuration problem.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { key } => write!(f, "compulsory parameter '{key}' is missing"),
            Self::InvalidParameter { key, value, reason } => {
                write!(f, "parameter '{key}' has invalid value '{value}': {reason}")
            }
            Self::InvalidUnitSystem { reason } => write!(f, "invalid unit system: {reason}"),
            Self::DuplicateField { name } => write!(f, "field '{name}' declared twice"),
            Self::TooManyFields { limit } => {
                write!(f, "field catalog exceeds its limit of {limit} fields")
            }
            Self::InvalidField { name, reason } => write!(f, "invalid field '{name}': {reason}"),
            Self::EmptyDescription { name } => {
                write!(f, "invalid (empty) description of the field '{name}'")
            }
            Self::ReadOnlyField { name } => write!(f, "field '{name}' cannot be read into"),
            Self::IntegerConversion { name, factor } => write!(
                f,
                "integer field '{name}' would need unit conversion factor {factor}"
            ),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Error for ConfigError {}
