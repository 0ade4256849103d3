//! Core types and traits for the Skewer extraction and I/O framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the abstractions shared by the rest of the workspace: unit systems,
//! field descriptors and catalogs, the particle contract, runtime
//! parameters, output selection policies, and configuration errors.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod column;
pub mod error;
pub mod field;
pub mod params;
pub mod particle;
pub mod select;
pub mod units;

pub use column::{CatalogView, CatalogViewMut, ColumnSink, ColumnSource};
pub use error::ConfigError;
pub use field::{
    Element, ElementType, FieldCatalog, FieldDescriber, FieldDescriptor, FieldMeta, Importance,
};
pub use params::Parameters;
pub use particle::{Paired, Particle};
pub use select::{AllFields, OutputSelection, ParameterSelection};
pub use units::{BaseUnit, UnitConversion, UnitSystem};
