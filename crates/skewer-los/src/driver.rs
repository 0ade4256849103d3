//! The collective sightline pass.
//!
//! Every rank calls [`LineOfSightDriver::run_pass`] with its own records.
//! The root draws the sightlines and broadcasts them. Then, one sightline
//! at a time, every rank counts its matches, the counts are exchanged,
//! the matches are copied and written into `/LOS_{j:04}` of a shared file.
//! The root finishes the file with `/Header`, the metadata groups and
//! `/LineOfSightParameters`.

use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use skewer_comm::{Communicator, GatherLayout, WorkerPool};
use skewer_core::{CatalogView, ConfigError, FieldCatalog, ParameterSelection, Particle};
use skewer_io::collective::{HyperslabWrite, WriteRequest, WriteStrategy, ROOT};
use skewer_io::metadata::{write_metadata_groups, write_run_header, HEADER_GROUP};
use skewer_io::{OutputTarget, RunContext, WriterConfig};
use skewer_store::{AttrValue, ContainerFile, StructuredStore};

use crate::error::LosError;
use crate::filter::{FilterConfig, LocalFilter};
use crate::props::LosProps;
use crate::sightline::{Sightline, SightlineSet};

/// Group describing the sightline configuration.
pub const PARAMETERS_GROUP: &str = "/LineOfSightParameters";

/// Stage of the pass the driver is in.
///
/// After a failed pass the state stays at the stage that failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverState {
    /// No pass running.
    #[default]
    Idle,
    /// The root is drawing sightlines.
    GeneratingSightlines,
    /// Counting local matches of one sightline.
    FilteringSightline {
        /// Sightline index.
        index: usize,
    },
    /// Exchanging counts and copying matches of one sightline.
    GatheringSightline {
        /// Sightline index.
        index: usize,
    },
    /// Writing one sightline group.
    WritingSightline {
        /// Sightline index.
        index: usize,
    },
    /// The root is writing the file header.
    WritingHeader,
}

/// What a completed pass produced, as seen by one rank.
#[derive(Clone, Debug, PartialEq)]
pub struct PassSummary {
    /// The file written.
    pub path: PathBuf,
    /// The sightlines with this rank's local and the global counts.
    pub sightlines: SightlineSet,
    /// Matches over all sightlines and ranks.
    pub total: u64,
}

/// Runs sightline passes and numbers their output files.
#[derive(Debug)]
pub struct LineOfSightDriver {
    props: LosProps,
    filter: LocalFilter,
    config: WriterConfig,
    strategy: WriteStrategy,
    directory: PathBuf,
    output_count: u32,
    state: DriverState,
}

impl LineOfSightDriver {
    /// A driver writing under `directory`, counting on all available cores.
    pub fn new(
        props: LosProps,
        filter: FilterConfig,
        config: WriterConfig,
        directory: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        props.validate()?;
        config.validate()?;
        Ok(Self {
            props,
            filter: LocalFilter::new(filter, WorkerPool::available())?,
            strategy: WriteStrategy::from_mode(config.mode),
            config,
            directory: directory.into(),
            output_count: 0,
            state: DriverState::Idle,
        })
    }

    /// Count on `pool` instead.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.filter = self.filter.with_pool(pool);
        self
    }

    /// Sightline configuration.
    pub fn props(&self) -> &LosProps {
        &self.props
    }

    /// Current stage.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of completed passes.
    pub fn output_count(&self) -> u32 {
        self.output_count
    }

    /// Continue numbering from `count`, e.g. after a restart.
    pub fn set_output_count(&mut self, count: u32) {
        self.output_count = count;
    }

    /// File name of pass number `count`.
    pub fn file_name(&self, count: u32) -> String {
        format!("{}_{count:04}.hdf5", self.props.basename)
    }

    /// Run one pass over this rank's `records`.
    ///
    /// Every rank must call this with the same catalog layout. Only the
    /// root draws from `rng`.
    pub fn run_pass<C, R, G>(
        &mut self,
        comm: &C,
        store: &dyn StructuredStore,
        ctx: &RunContext,
        catalog: &FieldCatalog<R>,
        records: &[R],
        rng: &mut G,
    ) -> Result<PassSummary, LosError>
    where
        C: Communicator,
        R: Particle + 'static,
        G: Rng,
    {
        let started = Instant::now();
        self.transition(DriverState::GeneratingSightlines);
        let generated = if comm.rank() == ROOT {
            tracing::info!(sightlines = self.props.num_total(), "line of sight pass started");
            Some(SightlineSet::generate(
                &self.props,
                ctx.periodic,
                ctx.box_size,
                rng,
            ))
        } else {
            None
        };
        let mut sightlines = comm.broadcast(generated, ROOT)?;

        let selection = ParameterSelection::new(&ctx.params, ParameterSelection::LINE_OF_SIGHT)?;
        let request = WriteRequest {
            ctx,
            selection: &selection,
            compression: self.config.compression,
            max_chunk_rows: self.config.max_chunk_rows,
        };

        let path = self.directory.join(self.file_name(self.output_count));
        let mut target = if comm.rank() == ROOT {
            OutputTarget::create(store, path.as_path())?
        } else {
            OutputTarget::detached(store, path.as_path())
        };
        comm.barrier()?;

        let mut total = 0u64;
        for (index, line) in sightlines.iter_mut().enumerate() {
            self.transition(DriverState::FilteringSightline { index });
            let counted = self.filter.count(line, records);

            self.transition(DriverState::GatheringSightline { index });
            let layout = GatherLayout::exchange(comm, counted)?;
            line.local_count = counted;
            line.global_count = layout.total();
            total += layout.total();
            if layout.total() == 0 {
                if comm.rank() == ROOT {
                    tracing::warn!(sightline = index, "line of sight is empty");
                }
                continue;
            }
            let matches = self.filter.compact(line, records, counted);
            if matches.len() as u64 != counted {
                return Err(LosError::Consistency {
                    sightline: index,
                    counted,
                    copied: matches.len() as u64,
                });
            }
            tracing::debug!(
                sightline = index,
                rank = comm.rank(),
                local = counted,
                global = layout.total(),
                "sightline filtered"
            );

            self.transition(DriverState::WritingSightline { index });
            let group = format!("/LOS_{index:04}");
            if comm.rank() == ROOT {
                let file = target.file()?;
                file.create_group(&group)?;
                write_sightline_attributes(file, &group, line)?;
            }
            let view = CatalogView::new(catalog, &matches);
            self.strategy
                .write_columns(comm, &mut target, &group, &view, &layout, &request)?;
        }

        self.transition(DriverState::WritingHeader);
        if comm.rank() == ROOT {
            let file = target.file()?;
            write_run_header(file, ctx)?;
            file.write_attribute(
                HEADER_GROUP,
                "TotalPartsInAllSightlines",
                &AttrValue::from(total),
            )?;
            write_metadata_groups(file, ctx)?;
            write_los_parameters(file, &self.props)?;
        }
        let path = target.finish()?;
        comm.barrier()?;

        self.output_count += 1;
        self.transition(DriverState::Idle);
        if comm.rank() == ROOT {
            tracing::info!(
                path = %path.display(),
                total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "line of sight pass finished"
            );
        }
        Ok(PassSummary {
            path,
            sightlines,
            total,
        })
    }

    fn transition(&mut self, next: DriverState) {
        tracing::debug!(from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }
}

fn write_sightline_attributes(
    file: &mut dyn ContainerFile,
    group: &str,
    line: &Sightline,
) -> Result<(), LosError> {
    let [x, y, z] = line.axes();
    file.write_attribute(group, "NumParts", &AttrValue::from(line.global_count))?;
    file.write_attribute(group, "Xaxis", &AttrValue::from(x as i32))?;
    file.write_attribute(group, "Yaxis", &AttrValue::from(y as i32))?;
    file.write_attribute(group, "Zaxis", &AttrValue::from(z as i32))?;
    file.write_attribute(group, "Xpos", &AttrValue::from(line.xpos))?;
    file.write_attribute(group, "Ypos", &AttrValue::from(line.ypos))?;
    Ok(())
}

fn write_los_parameters(file: &mut dyn ContainerFile, props: &LosProps) -> Result<(), LosError> {
    let g = PARAMETERS_GROUP;
    let count = |name: &str, n: u64| -> Result<AttrValue, ConfigError> {
        let n = i32::try_from(n).map_err(|_| ConfigError::InvalidConfig {
            reason: format!("{name} = {n} does not fit a 32-bit count"),
        })?;
        Ok(AttrValue::from(n))
    };
    let counts = [
        ("NumAlongXY", count("NumAlongXY", u64::from(props.num_along_xy))?),
        ("NumAlongYZ", count("NumAlongYZ", u64::from(props.num_along_yz))?),
        ("NumAlongXZ", count("NumAlongXZ", u64::from(props.num_along_xz))?),
        ("NumLineOfSight", count("NumLineOfSight", props.num_total())?),
    ];
    file.create_group(g)?;
    for (name, value) in &counts {
        file.write_attribute(g, name, value)?;
    }
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        file.write_attribute(g, &format!("Min{name}"), &AttrValue::from(props.min[axis]))?;
        file.write_attribute(g, &format!("Max{name}"), &AttrValue::from(props.max[axis]))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skewer_comm::SingleRank;
    use skewer_store::MemoryStore;
    use skewer_test_utils::{gas_catalog, seeded_rng, GasParticle};

    fn props() -> LosProps {
        LosProps {
            num_along_xy: 2,
            num_along_yz: 1,
            num_along_xz: 0,
            min: [0.0; 3],
            max: [1.0; 3],
            basename: "los".into(),
        }
    }

    fn driver() -> LineOfSightDriver {
        LineOfSightDriver::new(
            props(),
            FilterConfig::default(),
            WriterConfig::line_of_sight(),
            "",
        )
        .unwrap()
        .with_pool(WorkerPool::new(2))
    }

    #[test]
    fn file_names_have_four_digits() {
        let d = driver();
        assert_eq!(d.file_name(0), "los_0000.hdf5");
        assert_eq!(d.file_name(12), "los_0012.hdf5");
    }

    #[test]
    fn invalid_writer_config_is_rejected() {
        let config = WriterConfig {
            compression: 12,
            ..WriterConfig::line_of_sight()
        };
        match LineOfSightDriver::new(props(), FilterConfig::default(), config, "") {
            Err(ConfigError::InvalidConfig { .. }) => {}
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn oversized_counts_are_not_clamped() {
        let store = MemoryStore::new();
        let mut file = store.create(std::path::Path::new("params.hdf5")).unwrap();
        let mut p = props();
        p.num_along_xy = u32::MAX;
        match write_los_parameters(file.as_mut(), &p) {
            Err(LosError::Config(ConfigError::InvalidConfig { reason })) => {
                assert!(reason.contains("NumAlongXY"))
            }
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
        assert!(!file.has_group(PARAMETERS_GROUP));
    }

    #[test]
    fn empty_pass_writes_header_only() {
        let store = MemoryStore::new();
        let mut d = driver();
        let ctx = RunContext::default();
        let none: &[GasParticle] = &[];
        let summary = d
            .run_pass(&SingleRank, &store, &ctx, &gas_catalog(), none, &mut seeded_rng(3))
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.sightlines.len(), 3);
        assert_eq!(d.state(), DriverState::Idle);
        assert_eq!(d.output_count(), 1);

        let file = store.open_ro(&summary.path).unwrap();
        assert!(!file.has_group("/LOS_0000"));
        assert_eq!(
            file.read_attribute(HEADER_GROUP, "TotalPartsInAllSightlines")
                .unwrap()
                .as_i64(),
            Some(0)
        );
        assert_eq!(
            file.read_attribute(PARAMETERS_GROUP, "NumLineOfSight")
                .unwrap()
                .as_i64(),
            Some(3)
        );
        assert_eq!(
            file.read_attribute(PARAMETERS_GROUP, "Maxz").unwrap().as_f64(),
            Some(1.0)
        );
    }
}
