//! Collective structured-file output and input for Skewer.
//!
//! This crate turns field catalogs into chunked, checksummed datasets:
//!
//! - [`dataset`] declares datasets with their unit attributes, writes
//!   hyperslabs with unit conversion, and reads them back.
//! - [`metadata`] writes the header, unit, parameter and code groups.
//! - [`collective`] moves per-rank rows into one file, either through the
//!   aggregation rank ([`GatherWrite`]) or by rank-ordered turns
//!   ([`RoundRobinWrite`]).
//! - [`snapshot`] and [`reader`] write and read full particle snapshots
//!   over a table of [`KindStorage`] entries.
//! - [`xmf`] maintains the plain-text XDMF companion of a snapshot series.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collective;
pub mod context;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod kind;
pub mod metadata;
pub mod reader;
pub mod snapshot;
pub mod target;
pub mod xmf;

pub use collective::{
    CollectiveMode, GatherWrite, HyperslabWrite, RoundRobinWrite, WriteRequest, WriteStrategy,
};
pub use context::{RunContext, WriterConfig};
pub use error::OutputError;
pub use kind::{KindStorage, ParticleArray, PartKind};
pub use reader::{read_snapshot, ReadOptions, SnapshotInfo};
pub use snapshot::SnapshotWriter;
pub use target::OutputTarget;
