//! Structured container storage for Skewer.
//!
//! A container is a tree of groups holding typed attributes and chunked
//! datasets of fixed-width rows. [`StructuredStore`] opens containers by
//! path; [`ContainerFile`] is one open container. Two backends are
//! provided: [`MemoryStore`], which keeps every container in process
//! memory, and (with the `hdf5` feature) `Hdf5Store`, which writes real
//! HDF5 files.
//!
//! Object paths are `/`-separated and absolute, e.g. `"/LOS_0003/Masses"`.
//! Row data crosses the trait boundary as little-endian bytes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod container;
pub mod error;
pub mod filters;
pub mod layout;

pub use backend::memory::MemoryStore;
#[cfg(feature = "hdf5")]
pub use backend::hdf5::Hdf5Store;
pub use container::{ContainerFile, StructuredStore};
pub use error::StoreError;
pub use layout::{AttrValue, DatasetLayout};
