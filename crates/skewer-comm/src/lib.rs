//! Cross-rank coordination for Skewer.
//!
//! A [`Communicator`] provides the handful of synchronous collectives the
//! extraction and I/O layers need: barrier, broadcast, all-gather and
//! gather. [`SingleRank`] serves serial runs; [`LocalCluster`] runs several
//! ranks as threads of one process. [`GatherLayout`] turns per-rank counts
//! into global offsets, and [`WorkerPool`] runs the data-parallel part of
//! local filtering.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod communicator;
pub mod error;
pub mod gather;
pub mod pool;

pub use cluster::{ClusterConfig, LocalCluster, LocalRank};
pub use communicator::{Communicator, SingleRank};
pub use error::CommError;
pub use gather::{gather_records, GatherLayout};
pub use pool::WorkerPool;
