//! Sightline extraction for Skewer.
//!
//! A pass draws random sightlines through the box, selects on every rank
//! the particles whose smoothing kernel overlaps each sightline, and writes
//! the selected particles of all ranks into one structured file:
//!
//! - [`LosProps`] holds the run configuration, read from `LineOfSight:*`
//!   parameters and carried across restarts by [`write_restart`] /
//!   [`read_restart`].
//! - [`SightlineSet`] generates sightlines in the three axis-aligned planes.
//! - [`LocalFilter`] counts and copies the local matches of one sightline.
//! - [`LineOfSightDriver`] runs the collective pass and exposes its
//!   [`DriverState`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod driver;
pub mod error;
pub mod filter;
pub mod props;
pub mod restart;
pub mod sightline;

pub use driver::{DriverState, LineOfSightDriver, PassSummary};
pub use error::{LosError, RestartError};
pub use filter::{nearest, FilterConfig, LocalFilter};
pub use props::LosProps;
pub use restart::{read_restart, write_restart};
pub use sightline::{Plane, Sightline, SightlineSet};
