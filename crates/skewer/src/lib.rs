//! Skewer: distributed sightline extraction and collective structured-file
//! I/O for particle simulations.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Skewer sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use skewer::prelude::*;
//!
//! #[derive(Clone, Default)]
//! struct Gas {
//!     x: [f64; 3],
//!     h: f32,
//!     id: u64,
//! }
//!
//! impl Particle for Gas {
//!     fn position(&self) -> [f64; 3] { self.x }
//!     fn smoothing_length(&self) -> f32 { self.h }
//! }
//!
//! let mut catalog = FieldCatalog::new();
//! catalog
//!     .push(FieldDescriptor::vector(
//!         "Coordinates",
//!         UnitConversion::Length,
//!         "Co-moving positions",
//!         |g: &Gas| g.x,
//!     ))
//!     .unwrap();
//! catalog
//!     .push(FieldDescriptor::scalar(
//!         "ParticleIDs",
//!         UnitConversion::NoUnits,
//!         "Unique identifiers",
//!         |g: &Gas| g.id,
//!     ))
//!     .unwrap();
//!
//! let ctx = RunContext {
//!     box_size: [1.0; 3],
//!     params: Parameters::new()
//!         .with("LineOfSight:basename", "los")
//!         .with("LineOfSight:num_along_xy", 4),
//!     ..RunContext::default()
//! };
//! let props = LosProps::from_params(&ctx.params, ctx.box_size).unwrap();
//! let mut driver = LineOfSightDriver::new(
//!     props,
//!     FilterConfig::default(),
//!     WriterConfig::line_of_sight(),
//!     "",
//! )
//! .unwrap();
//!
//! // A row of particles along x, wide enough to cross every XY sightline
//! // with y near 0.5.
//! let gas: Vec<Gas> = (0..100)
//!     .map(|i| Gas { x: [i as f64 / 100.0, 0.5, 0.5], h: 0.05, id: i })
//!     .collect();
//! let store = MemoryStore::new();
//! let summary = driver
//!     .run_pass(&SingleRank, &store, &ctx, &catalog, &gas, &mut ChaCha8Rng::seed_from_u64(1))
//!     .unwrap();
//! assert_eq!(summary.sightlines.len(), 4);
//! assert_eq!(driver.state(), DriverState::Idle);
//! assert!(store.exists(&summary.path));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skewer-core` | Unit systems, field catalogs, particle contract, parameters |
//! | [`comm`] | `skewer-comm` | Communicators, gather layouts, worker pool |
//! | [`store`] | `skewer-store` | Structured container contract and backends |
//! | [`io`] | `skewer-io` | Dataset writing and reading, snapshots, XMF companion |
//! | [`los`] | `skewer-los` | Sightline generation, filtering and the pass driver |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and traits (`skewer-core`).
///
/// Contains [`types::UnitSystem`], [`types::FieldCatalog`] and the
/// [`types::Particle`] contract.
pub use skewer_core as types;

/// Rank communication (`skewer-comm`).
///
/// [`comm::SingleRank`] for serial runs, [`comm::LocalCluster`] for
/// in-process multi-rank runs.
pub use skewer_comm as comm;

/// Structured containers (`skewer-store`).
pub use skewer_store as store;

/// Structured-file output and input (`skewer-io`).
///
/// [`io::SnapshotWriter`] and [`io::read_snapshot`] handle full snapshots.
pub use skewer_io as io;

/// Sightline extraction (`skewer-los`).
pub use skewer_los as los;

/// Common imports for typical Skewer usage.
pub mod prelude {
    // Core types and traits
    pub use skewer_core::{
        AllFields, FieldCatalog, FieldDescriber, FieldDescriptor, OutputSelection, Paired,
        ParameterSelection, Parameters, Particle, UnitConversion, UnitSystem,
    };

    // Communication
    pub use skewer_comm::{Communicator, LocalCluster, SingleRank, WorkerPool};

    // Storage
    pub use skewer_store::{ContainerFile, MemoryStore, StructuredStore};

    // Output and input
    pub use skewer_io::{
        read_snapshot, CollectiveMode, KindStorage, ParticleArray, PartKind, ReadOptions,
        RunContext, SnapshotWriter, WriterConfig,
    };

    // Sightlines
    pub use skewer_los::{
        DriverState, FilterConfig, LineOfSightDriver, LosProps, PassSummary, SightlineSet,
    };

    // Errors
    pub use skewer_core::ConfigError;
    pub use skewer_io::OutputError;
    pub use skewer_los::{LosError, RestartError};
}
