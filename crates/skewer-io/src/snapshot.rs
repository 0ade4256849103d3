//! Full-snapshot output.

use std::path::{Path, PathBuf};
use std::time::Instant;

use skewer_comm::{Communicator, GatherLayout};
use skewer_core::{ConfigError, OutputSelection};
use skewer_store::{AttrValue, StructuredStore};

use crate::collective::{HyperslabWrite, WriteRequest, WriteStrategy, ROOT};
use crate::context::{RunContext, WriterConfig};
use crate::error::OutputError;
use crate::kind::{KindStorage, PartKind};
use crate::metadata::{write_metadata_groups, HEADER_GROUP};
use crate::target::OutputTarget;
use crate::xmf::{XmfKind, XmfSeries, XmfSnapshot};

/// Group holding runtime flags.
pub const RUNTIME_GROUP: &str = "/RuntimePars";

/// Writes numbered snapshot files `{basename}_{count:03}.hdf5`.
///
/// The output counter belongs to the writer and advances once per
/// completed snapshot.
#[derive(Debug)]
pub struct SnapshotWriter {
    basename: String,
    directory: PathBuf,
    output_count: u32,
    config: WriterConfig,
    strategy: WriteStrategy,
    xmf: bool,
}

impl SnapshotWriter {
    /// A writer producing files under `directory`.
    pub fn new(
        directory: impl Into<PathBuf>,
        basename: impl Into<String>,
        config: WriterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let basename = basename.into();
        if basename.is_empty() {
            return Err(ConfigError::InvalidConfig {
                reason: "snapshot basename is empty".into(),
            });
        }
        Ok(Self {
            basename,
            directory: directory.into(),
            output_count: 0,
            strategy: WriteStrategy::from_mode(config.mode),
            config,
            xmf: false,
        })
    }

    /// Also maintain the XDMF companion `{basename}.xmf`.
    pub fn with_xmf(mut self, enabled: bool) -> Self {
        self.xmf = enabled;
        self
    }

    /// Number of snapshots written so far.
    pub fn output_count(&self) -> u32 {
        self.output_count
    }

    /// File name of snapshot number `count`.
    pub fn file_name(&self, count: u32) -> String {
        format!("{}_{count:03}.hdf5", self.basename)
    }

    /// Path of the XDMF companion.
    pub fn xmf_path(&self) -> PathBuf {
        self.directory.join(format!("{}.xmf", self.basename))
    }

    /// Write one snapshot of `kinds`.
    ///
    /// Every rank passes storages for the same kinds, in the same order;
    /// a storage may hold zero local records. Returns the file path.
    pub fn write<C: Communicator>(
        &mut self,
        comm: &C,
        store: &dyn StructuredStore,
        ctx: &RunContext,
        kinds: &[&dyn KindStorage],
        selection: &dyn OutputSelection,
    ) -> Result<PathBuf, OutputError> {
        let started = Instant::now();
        let mut local = [0u64; PartKind::COUNT];
        let mut seen = [false; PartKind::COUNT];
        for storage in kinds {
            let kind = storage.kind();
            if std::mem::replace(&mut seen[kind.index()], true) {
                return Err(OutputError::DuplicateKind { kind });
            }
            local[kind.index()] = storage.len() as u64;
        }

        let all = comm.all_gather(local)?;
        let layouts: Vec<GatherLayout> = PartKind::ALL
            .iter()
            .map(|k| GatherLayout::from_counts(all.iter().map(|c| c[k.index()]).collect()))
            .collect();
        let totals: [u64; PartKind::COUNT] = std::array::from_fn(|i| layouts[i].total());

        let path = self.directory.join(self.file_name(self.output_count));
        let mut target = if comm.rank() == ROOT {
            let mut target = OutputTarget::create(store, path.as_path())?;
            write_snapshot_header(target.file()?, ctx, &totals)?;
            for kind in PartKind::ALL {
                if totals[kind.index()] > 0 {
                    target.file()?.create_group(&kind.group_name())?;
                }
            }
            target
        } else {
            OutputTarget::detached(store, path.as_path())
        };
        comm.barrier()?;

        let request = WriteRequest {
            ctx,
            selection,
            compression: self.config.compression,
            max_chunk_rows: self.config.max_chunk_rows,
        };
        for storage in kinds {
            let kind = storage.kind();
            if totals[kind.index()] == 0 {
                continue;
            }
            let source = storage.source();
            self.strategy.write_columns(
                comm,
                &mut target,
                &kind.group_name(),
                source.as_ref(),
                &layouts[kind.index()],
                &request,
            )?;
        }
        let path = target.finish()?;

        if self.xmf && comm.rank() == ROOT {
            self.append_xmf(&path, ctx, kinds, &totals, &request)?;
        }
        comm.barrier()?;

        self.output_count += 1;
        tracing::info!(
            path = %path.display(),
            total = totals.iter().sum::<u64>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot written"
        );
        Ok(path)
    }

    fn append_xmf(
        &self,
        path: &Path,
        ctx: &RunContext,
        kinds: &[&dyn KindStorage],
        totals: &[u64; PartKind::COUNT],
        request: &WriteRequest<'_>,
    ) -> Result<(), OutputError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut entry = XmfSnapshot {
            file_name,
            time: ctx.time,
            kinds: Vec::new(),
        };
        for storage in kinds {
            let kind = storage.kind();
            let count = totals[kind.index()];
            if count == 0 {
                continue;
            }
            let source = storage.source();
            let fields = request
                .enabled_columns(source.as_ref())?
                .into_iter()
                .map(|i| source.column(i).clone())
                .collect();
            entry.kinds.push(XmfKind {
                kind,
                count,
                fields,
            });
        }
        XmfSeries::new(self.xmf_path()).append(&entry, self.output_count == 0)
    }
}

/// Write `/RuntimePars`, the legacy `/Header` and the metadata groups.
fn write_snapshot_header(
    file: &mut dyn skewer_store::ContainerFile,
    ctx: &RunContext,
    totals: &[u64; PartKind::COUNT],
) -> Result<(), OutputError> {
    file.create_group(RUNTIME_GROUP)?;
    file.write_attribute(
        RUNTIME_GROUP,
        "PeriodicBoundariesOn",
        &AttrValue::from(i32::from(ctx.periodic)),
    )?;

    file.create_group(HEADER_GROUP)?;
    let h = HEADER_GROUP;
    file.write_attribute(h, "BoxSize", &AttrValue::from(ctx.box_size))?;
    file.write_attribute(h, "Time", &AttrValue::from(ctx.time))?;
    let this_file: Vec<i64> = totals.iter().map(|&n| n as i64).collect();
    let low: Vec<u32> = totals.iter().map(|&n| n as u32).collect();
    let high: Vec<u32> = totals.iter().map(|&n| (n >> 32) as u32).collect();
    file.write_attribute(h, "NumPart_ThisFile", &AttrValue::from(this_file))?;
    file.write_attribute(h, "NumPart_Total", &AttrValue::from(low))?;
    file.write_attribute(h, "NumPart_Total_HighWord", &AttrValue::from(high))?;
    file.write_attribute(h, "MassTable", &AttrValue::from([0.0f64; PartKind::COUNT]))?;
    let mut entropy = [0u32; PartKind::COUNT];
    entropy[PartKind::Gas.index()] = u32::from(ctx.entropy_ics);
    file.write_attribute(h, "Flag_Entropy_ICs", &AttrValue::from(entropy))?;
    file.write_attribute(h, "NumFilesPerSnapshot", &AttrValue::from(1i32))?;
    file.write_attribute(h, "Dimension", &AttrValue::from(ctx.dimension))?;
    file.write_attribute(h, "Redshift", &AttrValue::from(ctx.redshift))?;
    file.write_attribute(h, "Scale-factor", &AttrValue::from(ctx.scale_factor))?;

    write_metadata_groups(file, ctx)
}
