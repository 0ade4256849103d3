//! Container backends.

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;
