//! Collective hyperslab writes.
//!
//! Every rank holds some rows of a group's columns. A [`GatherLayout`]
//! places rank `r`'s rows at `[offset(r), offset(r) + count(r))` of each
//! dataset. Two strategies produce identical files:
//!
//! - [`GatherWrite`] moves every column to the root, which writes whole
//!   datasets.
//! - [`RoundRobinWrite`] lets the root declare the datasets, then each rank
//!   in turn opens the file and writes its own hyperslab, separated by
//!   barriers.

use skewer_comm::{gather_records, Communicator, GatherLayout};
use skewer_core::{ColumnSource, OutputSelection};

use crate::context::RunContext;
use crate::dataset::{check_writable, declare_dataset, dataset_path, write_subrange};
use crate::error::OutputError;
use crate::target::OutputTarget;

/// The rank that creates files and owns metadata.
pub const ROOT: usize = 0;

/// Which collective strategy moves rows into the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectiveMode {
    /// Aggregate on the root, which writes alone.
    #[default]
    Gather,
    /// Each rank writes its own hyperslab in rank order.
    RoundRobin,
}

/// Per-call write parameters shared by every dataset of a group.
#[derive(Clone, Copy)]
pub struct WriteRequest<'a> {
    /// Run metadata and unit systems.
    pub ctx: &'a RunContext,
    /// Which columns to write.
    pub selection: &'a dyn OutputSelection,
    /// Deflate level; 0 disables compression.
    pub compression: u8,
    /// Largest chunk along the row axis.
    pub max_chunk_rows: u64,
}

impl WriteRequest<'_> {
    /// Indices of the columns of `source` that are selected for output,
    /// after checking each can be written.
    pub fn enabled_columns(&self, source: &dyn ColumnSource) -> Result<Vec<usize>, OutputError> {
        let mut out = Vec::new();
        for i in 0..source.column_count() {
            let meta = source.column(i);
            if !self.selection.is_field_enabled(&meta.name) {
                continue;
            }
            check_writable(meta, self.ctx)?;
            out.push(i);
        }
        Ok(out)
    }
}

/// Write the local rows of a group's columns into one shared file.
///
/// Every rank calls this with the same `group`, `layout` and column set.
/// The group itself must already exist in the file.
pub trait HyperslabWrite {
    /// Write `local` (this rank's rows) into `group` of `target`.
    fn write_columns<C: Communicator>(
        &self,
        comm: &C,
        target: &mut OutputTarget<'_>,
        group: &str,
        local: &dyn ColumnSource,
        layout: &GatherLayout,
        request: &WriteRequest<'_>,
    ) -> Result<(), OutputError>;
}

/// Aggregate every column on the root, then write it whole.
#[derive(Clone, Copy, Debug, Default)]
pub struct GatherWrite;

impl HyperslabWrite for GatherWrite {
    fn write_columns<C: Communicator>(
        &self,
        comm: &C,
        target: &mut OutputTarget<'_>,
        group: &str,
        local: &dyn ColumnSource,
        layout: &GatherLayout,
        request: &WriteRequest<'_>,
    ) -> Result<(), OutputError> {
        for index in request.enabled_columns(local)? {
            let meta = local.column(index);
            let row_bytes = meta.record_bytes() as u64;
            let bytes_layout =
                GatherLayout::from_counts(layout.counts().iter().map(|c| c * row_bytes).collect());
            let gathered = gather_records(comm, &bytes_layout, local.gather(index), ROOT)?;
            if let Some(bytes) = gathered {
                let file = target.file()?;
                let path = declare_dataset(
                    file,
                    group,
                    meta,
                    layout.total(),
                    request.max_chunk_rows,
                    request.compression,
                    request.ctx,
                )?;
                write_subrange(file, &path, meta, bytes, 0, request.ctx)?;
            }
        }
        Ok(())
    }
}

/// Declare on the root, then write per-rank hyperslabs in rank order.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobinWrite;

impl HyperslabWrite for RoundRobinWrite {
    fn write_columns<C: Communicator>(
        &self,
        comm: &C,
        target: &mut OutputTarget<'_>,
        group: &str,
        local: &dyn ColumnSource,
        layout: &GatherLayout,
        request: &WriteRequest<'_>,
    ) -> Result<(), OutputError> {
        let rank = comm.rank();
        if local.rows() as u64 != layout.count(rank) {
            return Err(skewer_comm::CommError::CountMismatch {
                rank,
                expected: layout.count(rank),
                found: local.rows() as u64,
            }
            .into());
        }
        let columns = request.enabled_columns(local)?;

        if rank == ROOT {
            let file = target.file()?;
            for &index in &columns {
                declare_dataset(
                    file,
                    group,
                    local.column(index),
                    layout.total(),
                    request.max_chunk_rows,
                    request.compression,
                    request.ctx,
                )?;
            }
        }
        target.release()?;
        comm.barrier()?;

        for turn in 0..comm.size() {
            if turn == rank && layout.count(rank) > 0 {
                let file = target.file()?;
                for &index in &columns {
                    let meta = local.column(index);
                    let path = dataset_path(group, &meta.name);
                    write_subrange(
                        file,
                        &path,
                        meta,
                        local.gather(index),
                        layout.offset(rank),
                        request.ctx,
                    )?;
                }
                target.release()?;
                tracing::debug!(rank, rows = layout.count(rank), group, "hyperslab written");
            }
            comm.barrier()?;
        }
        Ok(())
    }
}

/// The strategy chosen by [`CollectiveMode`].
#[derive(Clone, Copy, Debug)]
pub enum WriteStrategy {
    /// See [`GatherWrite`].
    Gather(GatherWrite),
    /// See [`RoundRobinWrite`].
    RoundRobin(RoundRobinWrite),
}

impl WriteStrategy {
    /// The strategy for `mode`.
    pub fn from_mode(mode: CollectiveMode) -> Self {
        match mode {
            CollectiveMode::Gather => Self::Gather(GatherWrite),
            CollectiveMode::RoundRobin => Self::RoundRobin(RoundRobinWrite),
        }
    }

    /// The mode this strategy implements.
    pub fn mode(&self) -> CollectiveMode {
        match self {
            Self::Gather(_) => CollectiveMode::Gather,
            Self::RoundRobin(_) => CollectiveMode::RoundRobin,
        }
    }
}

impl HyperslabWrite for WriteStrategy {
    fn write_columns<C: Communicator>(
        &self,
        comm: &C,
        target: &mut OutputTarget<'_>,
        group: &str,
        local: &dyn ColumnSource,
        layout: &GatherLayout,
        request: &WriteRequest<'_>,
    ) -> Result<(), OutputError> {
        match self {
            Self::Gather(s) => s.write_columns(comm, target, group, local, layout, request),
            Self::RoundRobin(s) => s.write_columns(comm, target, group, local, layout, request),
        }
    }
}
