//! Snapshot input.
//!
//! The root inspects the file first and broadcasts what it found. Each
//! rank then takes the slice `[r·T/P, (r+1)·T/P)` of every kind and reads
//! it during its own turn.

use std::path::Path;

use skewer_comm::Communicator;
use skewer_core::UnitSystem;
use skewer_store::{ContainerFile, StructuredStore};

use crate::collective::ROOT;
use crate::dataset::read_field;
use crate::error::OutputError;
use crate::kind::{KindStorage, PartKind};
use crate::metadata::{read_unit_system, HEADER_GROUP, UNITS_GROUP};
use crate::snapshot::RUNTIME_GROUP;

/// Reader switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Size every rank's storage but read no particle data.
    pub dry_run: bool,
}

/// What the root learned from the file, shared with every rank.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotInfo {
    /// Whether the box is periodic.
    pub periodic: bool,
    /// Whether the gas carries entropy instead of energy.
    pub entropy_ics: bool,
    /// Box extent, cubic-expanded for legacy files.
    pub box_size: [f64; 3],
    /// Global particle count per kind.
    pub totals: [u64; PartKind::COUNT],
    /// Unit system the file is written in.
    pub input_units: UnitSystem,
}

impl SnapshotInfo {
    /// This rank's `(offset, count)` slice of kind `kind`.
    pub fn slice(&self, kind: PartKind, rank: usize, size: usize) -> (u64, u64) {
        let total = u128::from(self.totals[kind.index()]);
        let (r, p) = (rank as u128, size as u128);
        let start = (r * total / p) as u64;
        let end = ((r + 1) * total / p) as u64;
        (start, end - start)
    }
}

/// Read a snapshot into `kinds`.
///
/// Every rank passes storages for the same kinds. Each storage is resized
/// to this rank's slice and filled field by field.
pub fn read_snapshot<C: Communicator>(
    comm: &C,
    store: &dyn StructuredStore,
    path: &Path,
    internal_units: &UnitSystem,
    kinds: &mut [&mut dyn KindStorage],
    options: ReadOptions,
) -> Result<SnapshotInfo, OutputError> {
    let inspected = if comm.rank() == ROOT {
        Some(inspect(store, path, internal_units))
    } else {
        None
    };
    let info = comm.broadcast(inspected, ROOT)??;

    let (rank, size) = (comm.rank(), comm.size());
    for storage in kinds.iter_mut() {
        let (_, count) = info.slice(storage.kind(), rank, size);
        storage.resize(count as usize);
    }

    // A dry run takes a single turn on the root and reads no data.
    let turns = if options.dry_run { 1 } else { size };
    for turn in 0..turns {
        if turn == rank {
            let file = store.open_ro(path)?;
            for storage in kinds.iter_mut() {
                if options.dry_run {
                    check_kind(file.as_ref(), path, &info, storage.kind())?;
                } else {
                    read_kind(file.as_ref(), &info, &mut **storage, rank, size, internal_units)?;
                }
            }
            file.close()?;
        }
        comm.barrier()?;
    }
    tracing::info!(
        path = %path.display(),
        rank,
        total = info.totals.iter().sum::<u64>(),
        dry_run = options.dry_run,
        "snapshot read"
    );
    Ok(info)
}

fn check_kind(
    file: &dyn ContainerFile,
    path: &Path,
    info: &SnapshotInfo,
    kind: PartKind,
) -> Result<(), OutputError> {
    let group = kind.group_name();
    if info.totals[kind.index()] > 0 && !file.has_group(&group) {
        return Err(OutputError::InvalidFile {
            path: path.display().to_string(),
            reason: format!("no {group} group"),
        });
    }
    Ok(())
}

fn read_kind(
    file: &dyn ContainerFile,
    info: &SnapshotInfo,
    storage: &mut dyn KindStorage,
    rank: usize,
    size: usize,
    internal_units: &UnitSystem,
) -> Result<(), OutputError> {
    let kind = storage.kind();
    let (offset, count) = info.slice(kind, rank, size);
    if count == 0 {
        return Ok(());
    }
    let group = kind.group_name();
    let mut sink = storage.sink();
    for index in 0..sink.column_count() {
        read_field(
            file,
            &group,
            sink.as_mut(),
            index,
            offset,
            &info.input_units,
            internal_units,
        )?;
    }
    Ok(())
}

fn inspect(
    store: &dyn StructuredStore,
    path: &Path,
    internal_units: &UnitSystem,
) -> Result<SnapshotInfo, OutputError> {
    let file = store.open_ro(path)?;
    let invalid = |reason: String| OutputError::InvalidFile {
        path: path.display().to_string(),
        reason,
    };

    let periodic = if file.has_attribute(RUNTIME_GROUP, "PeriodicBoundariesOn") {
        let v = file.read_attribute(RUNTIME_GROUP, "PeriodicBoundariesOn")?;
        v.as_i64().ok_or_else(|| invalid("PeriodicBoundariesOn is not an integer".into()))? != 0
    } else {
        false
    };

    if !file.has_group(HEADER_GROUP) {
        return Err(invalid("no /Header group".into()));
    }
    let entropy_ics = file.has_attribute(HEADER_GROUP, "Flag_Entropy_ICs")
        && file
            .read_attribute(HEADER_GROUP, "Flag_Entropy_ICs")?
            .as_i64()
            .is_some_and(|v| v != 0);

    let raw_box = file
        .read_attribute(HEADER_GROUP, "BoxSize")?
        .to_f64_vec()
        .ok_or_else(|| invalid("BoxSize is not numeric".into()))?;
    let box_size = legacy_box(&raw_box).ok_or_else(|| invalid("BoxSize is empty".into()))?;

    let low = read_counts(file.as_ref(), "NumPart_Total", &invalid)?;
    let high = if file.has_attribute(HEADER_GROUP, "NumPart_Total_HighWord") {
        read_counts(file.as_ref(), "NumPart_Total_HighWord", &invalid)?
    } else {
        [0; PartKind::COUNT]
    };
    let totals = std::array::from_fn(|i| low[i] + (high[i] << 32));

    let input_units = match read_unit_system(file.as_ref(), UNITS_GROUP)? {
        Some(units) => units,
        None => {
            tracing::warn!(path = %path.display(), "no /Units group, assuming internal units");
            *internal_units
        }
    };
    if input_units == *internal_units {
        tracing::info!("input and internal units match, no conversion needed");
    } else {
        tracing::info!(
            input = ?input_units.base(),
            internal = ?internal_units.base(),
            "converting input units to internal units"
        );
    }
    file.close()?;

    Ok(SnapshotInfo {
        periodic,
        entropy_ics,
        box_size,
        totals,
        input_units,
    })
}

/// Expand a legacy cubic box: missing or negative y/z extents copy x.
fn legacy_box(raw: &[f64]) -> Option<[f64; 3]> {
    let x = *raw.first()?;
    let pick = |i: usize| match raw.get(i) {
        Some(&v) if v >= 0.0 => v,
        _ => x,
    };
    Some([x, pick(1), pick(2)])
}

fn read_counts(
    file: &dyn ContainerFile,
    name: &str,
    invalid: &dyn Fn(String) -> OutputError,
) -> Result<[u64; PartKind::COUNT], OutputError> {
    let values = file
        .read_attribute(HEADER_GROUP, name)?
        .to_i64_vec()
        .ok_or_else(|| invalid(format!("{name} is not an integer array")))?;
    let mut out = [0u64; PartKind::COUNT];
    for (slot, v) in out.iter_mut().zip(values) {
        *slot = u64::from(v as u32);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn legacy_box_expands_cubic() {
        assert_eq!(legacy_box(&[2.0]), Some([2.0; 3]));
        assert_eq!(legacy_box(&[2.0, -1.0, -1.0]), Some([2.0; 3]));
        assert_eq!(legacy_box(&[2.0, 3.0, 4.0]), Some([2.0, 3.0, 4.0]));
        assert_eq!(legacy_box(&[]), None);
    }

    #[test]
    fn slices_partition_the_total() {
        let mut info = SnapshotInfo {
            periodic: true,
            entropy_ics: false,
            box_size: [1.0; 3],
            totals: [0; PartKind::COUNT],
            input_units: UnitSystem::cgs(),
        };
        info.totals[0] = 10;
        let slices: Vec<_> = (0..3).map(|r| info.slice(PartKind::Gas, r, 3)).collect();
        assert_eq!(slices, vec![(0, 3), (3, 3), (6, 4)]);
        assert_eq!(info.slice(PartKind::Stars, 1, 3), (0, 0));
    }

    proptest! {
        #[test]
        fn slices_are_contiguous_and_cover_every_row(total in 0u64..1_000_000, size in 1usize..64) {
            let mut info = SnapshotInfo {
                periodic: false,
                entropy_ics: false,
                box_size: [1.0; 3],
                totals: [0; PartKind::COUNT],
                input_units: UnitSystem::cgs(),
            };
            info.totals[PartKind::Stars.index()] = total;
            let mut next = 0;
            for rank in 0..size {
                let (offset, count) = info.slice(PartKind::Stars, rank, size);
                prop_assert_eq!(offset, next);
                prop_assert!(count <= total / size as u64 + 1);
                next = offset + count;
            }
            prop_assert_eq!(next, total);
        }
    }
}
