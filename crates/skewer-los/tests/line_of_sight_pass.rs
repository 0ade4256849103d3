//! Collective sightline passes on in-process clusters.

use std::io::Cursor;

use skewer_comm::{Communicator, LocalCluster, SingleRank, WorkerPool};
use skewer_core::{ConfigError, FieldCatalog, FieldDescriptor, Parameters, UnitConversion};
use skewer_io::{CollectiveMode, OutputError, RunContext, WriterConfig};
use skewer_los::{
    read_restart, write_restart, DriverState, FilterConfig, LineOfSightDriver, LocalFilter,
    LosError, LosProps, PassSummary, Plane, Sightline, SightlineSet,
};
use skewer_store::{ContainerFile, MemoryStore, StructuredStore};
use skewer_test_utils::{
    gas_catalog, scatter_cluster, scatter_uniform, seeded_rng, split_across_ranks, GasParticle,
};

const SEED: u64 = 7;

fn context(box_size: f64, params: Parameters) -> RunContext {
    RunContext {
        box_size: [box_size; 3],
        run_name: "sightlines".into(),
        params,
        ..RunContext::default()
    }
}

fn props(xy: u32, yz: u32, xz: u32, min: f64, max: f64) -> LosProps {
    LosProps {
        num_along_xy: xy,
        num_along_yz: yz,
        num_along_xz: xz,
        min: [min; 3],
        max: [max; 3],
        basename: "los".into(),
    }
}

fn driver(props: LosProps, mode: CollectiveMode) -> LineOfSightDriver {
    let config = WriterConfig {
        mode,
        max_chunk_rows: 8,
        ..WriterConfig::line_of_sight()
    };
    LineOfSightDriver::new(props, FilterConfig::default(), config, "")
        .unwrap()
        .with_pool(WorkerPool::new(2))
}

fn run_on_cluster(
    store: &MemoryStore,
    ranks: usize,
    mode: CollectiveMode,
    props: &LosProps,
    ctx: &RunContext,
    parts: &[Vec<GasParticle>],
) -> Vec<PassSummary> {
    let cluster = LocalCluster::with_ranks(ranks).unwrap();
    cluster
        .run(|comm| -> Result<PassSummary, LosError> {
            let mut d = driver(props.clone(), mode);
            d.run_pass(
                comm,
                store,
                ctx,
                &gas_catalog(),
                &parts[comm.rank()],
                &mut seeded_rng(SEED),
            )
        })
        .unwrap()
}

fn read_ids(file: &dyn ContainerFile, group: &str, rows: u64) -> Vec<u64> {
    file.read_rows(&format!("{group}/ParticleIDs"), 0, rows)
        .unwrap()
        .chunks_exact(8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .collect()
}

fn attr_i64(file: &dyn ContainerFile, object: &str, name: &str) -> i64 {
    file.read_attribute(object, name).unwrap().as_i64().unwrap()
}

#[test]
fn nine_sightlines_match_brute_force() {
    let mut rng = seeded_rng(42);
    let mut particles = scatter_uniform(&mut rng, 800, [10.0; 3], 0.4, 0);
    particles.extend(scatter_cluster(&mut rng, 200, [5.0; 3], 1.0, 0.6, 800));
    let parts = split_across_ranks(&particles, 3);
    let p = props(3, 3, 3, 0.0, 10.0);
    let ctx = context(10.0, Parameters::new());
    let store = MemoryStore::new();

    let summaries = run_on_cluster(&store, 3, CollectiveMode::Gather, &p, &ctx, &parts);

    let expected = SightlineSet::generate(&p, true, [10.0; 3], &mut seeded_rng(SEED));
    let brute = LocalFilter::new(FilterConfig::default(), WorkerPool::new(1)).unwrap();
    let file = store.open_ro(&summaries[0].path).unwrap();
    let mut grand_total = 0u64;
    for (j, line) in expected.iter().enumerate() {
        let ids: Vec<u64> = particles
            .iter()
            .filter(|q| brute.matches(line, *q))
            .map(|q| q.id)
            .collect();
        let n = ids.len() as u64;
        grand_total += n;

        let local_sum: u64 = summaries
            .iter()
            .map(|s| s.sightlines.get(j).unwrap().local_count)
            .sum();
        for s in &summaries {
            assert_eq!(s.sightlines.get(j).unwrap().global_count, n, "sightline {j}");
        }
        assert_eq!(local_sum, n, "sightline {j}");

        let group = format!("/LOS_{j:04}");
        if n == 0 {
            assert!(!file.has_group(&group));
            continue;
        }
        assert_eq!(attr_i64(file.as_ref(), &group, "NumParts"), n as i64);
        let [x, y, z] = line.axes();
        assert_eq!(attr_i64(file.as_ref(), &group, "Xaxis"), x as i64);
        assert_eq!(attr_i64(file.as_ref(), &group, "Yaxis"), y as i64);
        assert_eq!(attr_i64(file.as_ref(), &group, "Zaxis"), z as i64);
        let xpos = file.read_attribute(&group, "Xpos").unwrap().as_f64().unwrap();
        assert_eq!(xpos, line.xpos);
        assert_eq!(read_ids(file.as_ref(), &group, n), ids);
    }

    assert!(grand_total > 0);
    for s in &summaries {
        assert_eq!(s.total, grand_total);
    }
    assert_eq!(
        attr_i64(file.as_ref(), "/Header", "TotalPartsInAllSightlines"),
        grand_total as i64
    );
    assert_eq!(attr_i64(file.as_ref(), "/LineOfSightParameters", "NumLineOfSight"), 9);
    assert_eq!(attr_i64(file.as_ref(), "/LineOfSightParameters", "NumAlongYZ"), 3);
    assert!(file.has_group("/Units"));
    assert!(file.has_group("/Parameters"));
    assert_eq!(
        file.read_attribute("/Header", "Code").unwrap().as_str(),
        Some("SWIFT")
    );
}

#[test]
fn sightline_through_a_cluster_selects_exactly_its_tube() {
    // 1000 small particles with a 2x2 block of large ones inserted midway.
    let mut particles = scatter_uniform(&mut seeded_rng(5), 1000, [10.0; 3], 0.1, 0);
    let cluster: Vec<GasParticle> = [(-0.25, -0.25), (-0.25, 0.25), (0.25, -0.25), (0.25, 0.25)]
        .iter()
        .enumerate()
        .map(|(k, &(dx, dy))| GasParticle {
            x: [5.0 + dx, 5.0 + dy, 2.0 + 2.0 * k as f64],
            h: 1.0,
            mass: 2.0,
            id: 5000 + k as u64,
            ..GasParticle::default()
        })
        .collect();
    particles.splice(500..500, cluster);
    let parts = split_across_ranks(&particles, 3);

    let mut p = props(1, 0, 0, 0.0, 10.0);
    p.min = [5.0, 5.0, 0.0];
    p.max = [5.0, 5.0, 10.0];
    let ctx = context(10.0, Parameters::new());
    let store = MemoryStore::new();
    let summaries = run_on_cluster(&store, 3, CollectiveMode::RoundRobin, &p, &ctx, &parts);

    let line = Sightline {
        plane: Plane::Xy,
        xpos: 5.0,
        ypos: 5.0,
        periodic: ctx.periodic,
        dim: [10.0; 3],
        local_count: 0,
        global_count: 0,
    };
    let drawn = summaries[0].sightlines.get(0).unwrap();
    assert_eq!((drawn.plane, drawn.xpos, drawn.ypos), (Plane::Xy, 5.0, 5.0));

    let brute = LocalFilter::new(FilterConfig::default(), WorkerPool::new(1)).unwrap();
    let members: Vec<u64> = particles
        .iter()
        .filter(|q| brute.matches(&line, *q))
        .map(|q| q.id)
        .collect();
    for k in 0..4 {
        assert!(members.contains(&(5000 + k)));
    }
    let n = members.len() as u64;
    assert_eq!(drawn.global_count, n);

    let file = store.open_ro(&summaries[0].path).unwrap();
    assert_eq!(attr_i64(file.as_ref(), "/LOS_0000", "NumParts"), n as i64);
    assert_eq!(attr_i64(file.as_ref(), "/LOS_0000", "Zaxis"), 2);
    assert_eq!(
        file.read_attribute("/LOS_0000", "Ypos").unwrap().as_f64(),
        Some(5.0)
    );
    assert_eq!(read_ids(file.as_ref(), "/LOS_0000", n), members);
    assert_eq!(summaries[1].total, n);
}

/// One sightline through (0.5, 0.5) along z. Rank 0 holds three particles
/// far from it, rank 1 holds five on it.
fn zero_and_five() -> (LosProps, Vec<Vec<GasParticle>>) {
    let mut p = props(1, 0, 0, 0.0, 1.0);
    p.min = [0.5, 0.5, 0.0];
    p.max = [0.5, 0.5, 1.0];
    let far: Vec<GasParticle> = (0..3)
        .map(|k| GasParticle {
            x: [0.1, 0.1, 0.2 * k as f64],
            h: 0.01,
            id: k,
            ..GasParticle::default()
        })
        .collect();
    let near: Vec<GasParticle> = (0..5)
        .map(|k| GasParticle {
            x: [0.5 + 0.001 * k as f64, 0.5, 0.1 * k as f64],
            v: [k as f32, 0.0, 0.0],
            mass: 1.0,
            h: 0.01,
            id: 100 + k,
            ..GasParticle::default()
        })
        .collect();
    (p, vec![far, near])
}

#[test]
fn rank_without_matches_contributes_nothing_in_both_modes() {
    let (p, parts) = zero_and_five();
    let ctx = context(1.0, Parameters::new());
    let mut coordinates = Vec::new();

    for mode in [CollectiveMode::Gather, CollectiveMode::RoundRobin] {
        let store = MemoryStore::new();
        let summaries = run_on_cluster(&store, 2, mode, &p, &ctx, &parts);
        let line = |r: usize| summaries[r].sightlines.get(0).unwrap().clone();
        assert_eq!(line(0).local_count, 0);
        assert_eq!(line(1).local_count, 5);
        assert_eq!(line(0).global_count, 5);

        let file = store.open_ro(&summaries[0].path).unwrap();
        assert_eq!(attr_i64(file.as_ref(), "/LOS_0000", "NumParts"), 5);
        assert_eq!(read_ids(file.as_ref(), "/LOS_0000", 5), vec![100, 101, 102, 103, 104]);
        let layout = file.dataset_layout("/LOS_0000/Coordinates").unwrap();
        assert_eq!(layout.shape.as_slice(), &[5, 3]);
        assert_eq!(layout.chunk_rows(), 5);
        assert!(layout.fletcher32);
        coordinates.push(file.read_rows("/LOS_0000/Coordinates", 0, 5).unwrap());
    }
    assert_eq!(coordinates[0], coordinates[1]);
}

#[test]
fn empty_sightlines_are_skipped_but_numbered() {
    let (mut p, parts) = zero_and_five();
    p.num_along_xz = 1;
    p.min[2] = 0.9;
    p.max[2] = 0.9;
    let ctx = context(1.0, Parameters::new());
    let store = MemoryStore::new();
    let summaries = run_on_cluster(&store, 2, CollectiveMode::Gather, &p, &ctx, &parts);

    // The XZ sightline sits at x = 0.5, z = 0.9, away from every particle.
    let file = store.open_ro(&summaries[0].path).unwrap();
    assert!(file.has_group("/LOS_0000"));
    assert!(!file.has_group("/LOS_0001"));
    assert_eq!(summaries[0].total, 5);
}

#[test]
fn deselected_fields_are_not_written() {
    let (p, parts) = zero_and_five();
    let params = Parameters::new()
        .with("SelectOutputLOS:Velocities", 0)
        .with("SelectOutputLOS:Masses", 1);
    let ctx = context(1.0, params);
    let store = MemoryStore::new();
    let summaries = run_on_cluster(&store, 2, CollectiveMode::RoundRobin, &p, &ctx, &parts);

    let file = store.open_ro(&summaries[0].path).unwrap();
    assert!(!file.has_dataset("/LOS_0000/Velocities"));
    assert!(file.has_dataset("/LOS_0000/Masses"));
    assert!(file.has_dataset("/LOS_0000/Coordinates"));
}

#[test]
fn failed_pass_records_its_stage_and_the_next_pass_recovers() {
    let (p, parts) = zero_and_five();
    let records = &parts[1];
    let ctx = context(1.0, Parameters::new());
    let store = MemoryStore::new();
    let mut d = driver(p, CollectiveMode::Gather);

    let mut undocumented = FieldCatalog::new();
    undocumented
        .push(FieldDescriptor::scalar(
            "Masses",
            UnitConversion::Mass,
            " ",
            |q: &GasParticle| q.mass,
        ))
        .unwrap();
    match d.run_pass(&SingleRank, &store, &ctx, &undocumented, records, &mut seeded_rng(1)) {
        Err(LosError::Output(OutputError::Config(ConfigError::EmptyDescription { name }))) => {
            assert_eq!(name, "Masses")
        }
        other => panic!("expected EmptyDescription, got {other:?}"),
    }
    assert_eq!(d.state(), DriverState::WritingSightline { index: 0 });
    assert_eq!(d.output_count(), 0);

    let summary = d
        .run_pass(&SingleRank, &store, &ctx, &gas_catalog(), records, &mut seeded_rng(1))
        .unwrap();
    assert_eq!(d.state(), DriverState::Idle);
    assert_eq!(d.output_count(), 1);
    assert_eq!(summary.path.to_str(), Some("los_0000.hdf5"));
    assert_eq!(summary.total, 5);

    let next = d
        .run_pass(&SingleRank, &store, &ctx, &gas_catalog(), records, &mut seeded_rng(1))
        .unwrap();
    assert_eq!(next.path.to_str(), Some("los_0001.hdf5"));
    assert!(store.exists(&summary.path));
}

#[test]
fn restored_configuration_draws_the_same_sightlines() {
    let p = LosProps::from_params(
        &Parameters::new()
            .with("LineOfSight:basename", "restarted")
            .with("LineOfSight:num_along_xy", 2)
            .with("LineOfSight:num_along_xz", 3)
            .with("LineOfSight:zmin", 2.5),
        [4.0, 5.0, 6.0],
    )
    .unwrap();
    let mut stream = Vec::new();
    write_restart(&mut stream, &p).unwrap();
    let restored = read_restart(&mut Cursor::new(stream)).unwrap();
    assert_eq!(restored, p);

    let a = SightlineSet::generate(&p, false, [4.0, 5.0, 6.0], &mut seeded_rng(9));
    let b = SightlineSet::generate(&restored, false, [4.0, 5.0, 6.0], &mut seeded_rng(9));
    assert_eq!(a, b);
    let d = driver(restored, CollectiveMode::Gather);
    assert_eq!(d.file_name(3), "restarted_0003.hdf5");
}
