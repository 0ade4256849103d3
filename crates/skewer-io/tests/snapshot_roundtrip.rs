//! Snapshot write/read round trips across rank counts and collective modes.

use std::path::{Path, PathBuf};

use skewer_comm::{Communicator, LocalCluster, SingleRank};
use skewer_core::{AllFields, OutputSelection, Parameters, UnitSystem};
use skewer_io::{
    read_snapshot, CollectiveMode, KindStorage, OutputError, ParticleArray, PartKind,
    ReadOptions, RunContext, SnapshotWriter, WriterConfig,
};
use skewer_store::{MemoryStore, StructuredStore};
use skewer_test_utils::{
    dark_matter_catalog, gas_catalog, scatter_uniform, seeded_rng, split_across_ranks,
    DarkMatterParticle, GasParticle,
};

/// Kilometre-based code units whose factors keep every `f32` field finite.
fn code_units() -> UnitSystem {
    UnitSystem::new(1.0e10, 1.0e5, 1.0, 1.0, 1.0).unwrap()
}

fn context() -> RunContext {
    RunContext {
        time: 0.25,
        box_size: [10.0; 3],
        internal_units: code_units(),
        output_units: UnitSystem::cgs(),
        run_name: "roundtrip".into(),
        params: Parameters::new().with("Snapshots:basename", "snap"),
        ..RunContext::default()
    }
}

fn gas(n: usize) -> Vec<GasParticle> {
    let mut particles = scatter_uniform(&mut seeded_rng(11), n, [10.0; 3], 0.3, 1);
    for (i, p) in particles.iter_mut().enumerate() {
        p.rho = 0.5 + i as f32;
    }
    particles
}

fn dark_matter(n: usize) -> Vec<DarkMatterParticle> {
    (0..n)
        .map(|i| DarkMatterParticle {
            x: [i as f64, 1.0, 2.0],
            v: [0.0, i as f32, 0.0],
            mass: 3.0,
            id: 10_000 + i as u64,
        })
        .collect()
}

fn write_on_cluster(
    store: &MemoryStore,
    ranks: usize,
    mode: CollectiveMode,
    gas: &[GasParticle],
    dm: &[DarkMatterParticle],
    selection: &(dyn OutputSelection + Sync),
) -> PathBuf {
    let gas_parts = split_across_ranks(gas, ranks);
    let dm_parts = split_across_ranks(dm, ranks);
    let ctx = context();
    let cluster = LocalCluster::with_ranks(ranks).unwrap();
    let paths = cluster
        .run(|comm| -> Result<PathBuf, OutputError> {
            let config = WriterConfig {
                mode,
                max_chunk_rows: 4,
                ..WriterConfig::snapshot()
            };
            let mut writer = SnapshotWriter::new("", "snap", config)?;
            let g = ParticleArray::new(
                PartKind::Gas,
                gas_catalog(),
                gas_parts[comm.rank()].clone(),
            );
            let d = ParticleArray::new(
                PartKind::DarkMatter,
                dark_matter_catalog(),
                dm_parts[comm.rank()].clone(),
            );
            writer.write(comm, store, &ctx, &[&g, &d], selection)
        })
        .unwrap();
    paths[0].clone()
}

fn read_on_cluster(
    store: &MemoryStore,
    ranks: usize,
    path: &Path,
) -> Result<(Vec<GasParticle>, Vec<DarkMatterParticle>), OutputError> {
    let cluster = LocalCluster::with_ranks(ranks)?;
    let per_rank = cluster.run(
        |comm| -> Result<(Vec<GasParticle>, Vec<DarkMatterParticle>), OutputError> {
            let mut g = ParticleArray::new(PartKind::Gas, gas_catalog(), Vec::new());
            let mut d = ParticleArray::new(PartKind::DarkMatter, dark_matter_catalog(), Vec::new());
            read_snapshot(
                comm,
                store,
                path,
                &code_units(),
                &mut [&mut g, &mut d],
                ReadOptions::default(),
            )?;
            Ok((g.into_records(), d.into_records()))
        },
    )?;
    let mut gas = Vec::new();
    let mut dm = Vec::new();
    for (g, d) in per_rank {
        gas.extend(g);
        dm.extend(d);
    }
    Ok((gas, dm))
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() <= 1e-5 * a.abs().max(b.abs()).max(1e-30), "{a} vs {b}");
}

#[test]
fn header_records_kinds_and_counts() {
    let store = MemoryStore::new();
    let path = write_on_cluster(&store, 2, CollectiveMode::Gather, &gas(9), &[], &AllFields);
    assert_eq!(path, PathBuf::from("snap_000.hdf5"));

    let file = store.open_ro(&path).unwrap();
    assert!(file.has_group("/PartType0"));
    assert!(!file.has_group("/PartType1"));
    let totals = file.read_attribute("/Header", "NumPart_Total").unwrap();
    assert_eq!(totals.to_i64_vec(), Some(vec![9, 0, 0, 0, 0, 0]));
    let high = file.read_attribute("/Header", "NumPart_Total_HighWord").unwrap();
    assert_eq!(high.to_i64_vec(), Some(vec![0; 6]));
    let periodic = file.read_attribute("/RuntimePars", "PeriodicBoundariesOn").unwrap();
    assert_eq!(periodic.as_i64(), Some(1));
    assert_eq!(
        file.read_attribute("/Header", "NumFilesPerSnapshot").unwrap().as_i64(),
        Some(1)
    );
    assert!(file.has_group("/Units"));
    assert!(file.has_group("/InternalCodeUnits"));
    assert!(file.has_group("/Parameters"));
    assert!(file.has_dataset("/PartType0/Coordinates"));
    let layout = file.dataset_layout("/PartType0/Coordinates").unwrap();
    assert_eq!(layout.shape.as_slice(), &[9, 3]);
    assert_eq!(layout.chunk_rows(), 4);
}

#[test]
fn round_trip_converts_units_both_ways() {
    let store = MemoryStore::new();
    let original_gas = gas(13);
    let original_dm = dark_matter(5);
    let path = write_on_cluster(
        &store,
        3,
        CollectiveMode::RoundRobin,
        &original_gas,
        &original_dm,
        &AllFields,
    );

    // Stored in CGS.
    let file = store.open_ro(&path).unwrap();
    let raw = file.read_rows("/PartType0/Coordinates", 0, 1).unwrap();
    let x0 = f64::from_le_bytes(raw[..8].try_into().unwrap());
    assert_close(x0, original_gas[0].x[0] * 1.0e5);

    let (back_gas, back_dm) = read_on_cluster(&store, 2, &path).unwrap();
    assert_eq!(back_gas.len(), original_gas.len());
    assert_eq!(back_dm.len(), original_dm.len());
    for (a, b) in original_gas.iter().zip(&back_gas) {
        assert_eq!(a.id, b.id);
        for k in 0..3 {
            assert_close(a.x[k], b.x[k]);
        }
        assert_close(f64::from(a.mass), f64::from(b.mass));
        assert_close(f64::from(a.rho), f64::from(b.rho));
    }
    for (a, b) in original_dm.iter().zip(&back_dm) {
        assert_eq!(a.id, b.id);
        assert_close(a.x[0], b.x[0]);
    }
}

#[test]
fn collective_modes_write_identical_datasets() {
    let particles = gas(10);
    let a = MemoryStore::new();
    let b = MemoryStore::new();
    let pa = write_on_cluster(&a, 3, CollectiveMode::Gather, &particles, &[], &AllFields);
    let pb = write_on_cluster(&b, 3, CollectiveMode::RoundRobin, &particles, &[], &AllFields);
    let fa = a.open_ro(&pa).unwrap();
    let fb = b.open_ro(&pb).unwrap();
    for name in ["Coordinates", "Velocities", "Masses", "ParticleIDs", "Densities"] {
        let path = format!("/PartType0/{name}");
        assert_eq!(
            fa.read_rows(&path, 0, 10).unwrap(),
            fb.read_rows(&path, 0, 10).unwrap(),
            "{name}"
        );
    }
}

#[test]
fn absent_optional_field_reads_as_zero() {
    let store = MemoryStore::new();
    let no_density = |name: &str| name != "Densities";
    let path = write_on_cluster(&store, 1, CollectiveMode::Gather, &gas(4), &[], &no_density);
    let (back, _) = read_on_cluster(&store, 1, &path).unwrap();
    assert_eq!(back.len(), 4);
    assert!(back.iter().all(|p| p.rho == 0.0));
    assert!(back.iter().all(|p| p.mass > 0.0));
}

#[test]
fn absent_compulsory_field_is_fatal_on_every_rank() {
    let store = MemoryStore::new();
    let no_mass = |name: &str| name != "Masses";
    let path = write_on_cluster(&store, 2, CollectiveMode::Gather, &gas(4), &[], &no_mass);
    match read_on_cluster(&store, 2, &path) {
        Err(OutputError::MissingCompulsory { field, group }) => {
            assert_eq!(field, "Masses");
            assert_eq!(group, "/PartType0");
        }
        other => panic!("expected MissingCompulsory, got {other:?}"),
    }
}

#[test]
fn missing_units_group_assumes_internal_units() {
    let store = MemoryStore::new();
    {
        let mut file = store.create(Path::new("ics.hdf5")).unwrap();
        file.create_group("/Header").unwrap();
        file.write_attribute("/Header", "BoxSize", &5.0f64.into()).unwrap();
        file.write_attribute("/Header", "NumPart_Total", &[0u32; 6].into())
            .unwrap();
        file.close().unwrap();
    }
    let mut g = ParticleArray::new(PartKind::Gas, gas_catalog(), vec![GasParticle::default()]);
    let info = read_snapshot(
        &SingleRank,
        &store,
        Path::new("ics.hdf5"),
        &code_units(),
        &mut [&mut g],
        ReadOptions::default(),
    )
    .unwrap();
    assert_eq!(info.input_units, code_units());
    assert_eq!(info.box_size, [5.0; 3]);
    assert!(!info.periodic);
    assert_eq!(g.len(), 0);
}

fn dry_run_on_cluster(
    store: &MemoryStore,
    ranks: usize,
    path: &Path,
) -> Result<Vec<Vec<GasParticle>>, OutputError> {
    let cluster = LocalCluster::with_ranks(ranks)?;
    cluster.run(|comm| -> Result<Vec<GasParticle>, OutputError> {
        let mut g = ParticleArray::new(PartKind::Gas, gas_catalog(), Vec::new());
        read_snapshot(
            comm,
            store,
            path,
            &code_units(),
            &mut [&mut g],
            ReadOptions { dry_run: true },
        )?;
        Ok(g.into_records())
    })
}

#[test]
fn dry_run_allocates_every_rank() {
    let store = MemoryStore::new();
    let path = write_on_cluster(&store, 1, CollectiveMode::Gather, &gas(6), &[], &AllFields);
    let per_rank = dry_run_on_cluster(&store, 3, &path).unwrap();
    let sizes: Vec<usize> = per_rank.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 2]);
    let filled: Vec<usize> = per_rank
        .iter()
        .map(|records| records.iter().filter(|p| p.id != 0 || p.mass != 0.0).count())
        .collect();
    assert_eq!(filled, vec![0, 0, 0]);
    assert!(per_rank.iter().flatten().all(|p| *p == GasParticle::default()));
}

#[test]
fn dry_run_does_not_require_compulsory_fields() {
    let store = MemoryStore::new();
    let no_mass = |name: &str| name != "Masses";
    let path = write_on_cluster(&store, 2, CollectiveMode::Gather, &gas(4), &[], &no_mass);
    let per_rank = dry_run_on_cluster(&store, 2, &path).unwrap();
    assert_eq!(per_rank.iter().map(Vec::len).sum::<usize>(), 4);
}

#[test]
fn output_counter_advances_and_xmf_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let ctx = context();
    let mut writer = SnapshotWriter::new(dir.path(), "series", WriterConfig::default())
        .unwrap()
        .with_xmf(true);
    let g = ParticleArray::new(PartKind::Gas, gas_catalog(), gas(3));
    for _ in 0..2 {
        writer
            .write(&SingleRank, &store, &ctx, &[&g], &AllFields)
            .unwrap();
    }
    assert_eq!(writer.output_count(), 2);
    assert!(store.exists(&dir.path().join("series_001.hdf5")));
    let xmf = std::fs::read_to_string(writer.xmf_path()).unwrap();
    assert!(xmf.contains("series_000.hdf5:/PartType0/Coordinates"));
    assert!(xmf.contains("series_001.hdf5:/PartType0/Masses"));
    assert_eq!(xmf.matches("</Xdmf>").count(), 1);
}

#[test]
fn duplicate_kind_is_rejected() {
    let store = MemoryStore::new();
    let mut writer = SnapshotWriter::new("", "dup", WriterConfig::default()).unwrap();
    let a = ParticleArray::new(PartKind::Gas, gas_catalog(), gas(1));
    let b = ParticleArray::new(PartKind::Gas, gas_catalog(), gas(1));
    match writer.write(&SingleRank, &store, &context(), &[&a, &b], &AllFields) {
        Err(OutputError::DuplicateKind { kind }) => assert_eq!(kind, PartKind::Gas),
        other => panic!("expected DuplicateKind, got {other:?}"),
    }
    assert_eq!(writer.output_count(), 0);
}
