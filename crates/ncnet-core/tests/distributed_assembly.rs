//! Assembling on several ranks yields the same network as a serial run.

use std::collections::BTreeMap;

use ncnet_core::feed::Distribution;
use ncnet_core::{
    CellType, Communicator, Edge, FeedConfig, FeedTargetConfig, Gid, GridSize, LocalCluster,
    NetworkAssembler, NetworkConfig, Result, SingleProcess, TrialSeedPolicy,
};

#[derive(Debug, Default, PartialEq)]
struct Snapshot {
    edges: BTreeMap<Gid, Vec<Edge>>,
    events: BTreeMap<Gid, Vec<f64>>,
}

impl Snapshot {
    fn merge(parts: Vec<Snapshot>) -> Self {
        let mut merged = Snapshot::default();
        for part in parts {
            for (gid, edges) in part.edges {
                assert!(merged.edges.insert(gid, edges).is_none(), "cell {} on two ranks", gid);
            }
            for (gid, events) in part.events {
                assert!(merged.events.insert(gid, events).is_none(), "input {} on two ranks", gid);
            }
        }
        merged
    }
}

fn snapshot<C: Communicator>(assembler: &NetworkAssembler<C>) -> Result<Snapshot> {
    let mut snap = Snapshot::default();
    for cell in assembler.local_cells()? {
        let edges = assembler.incoming_edges(cell.gid)?.iter().copied().collect();
        snap.edges.insert(cell.gid, edges);
    }
    for feed in assembler.local_feeds()? {
        snap.events.insert(feed.gid, feed.events.clone());
    }
    Ok(snap)
}

fn target(ampa: f64, sigma: f64, rate: f64) -> FeedTargetConfig {
    FeedTargetConfig {
        ampa,
        nmda: ampa / 2.0,
        delay: 1.0,
        sigma,
        mean: 80.0,
        rate,
    }
}

fn busy_config() -> NetworkConfig {
    let all = |t: FeedTargetConfig| -> BTreeMap<CellType, FeedTargetConfig> {
        CellType::ALL.iter().map(|&c| (c, t.clone())).collect()
    };
    NetworkConfig {
        tstop: 200.0,
        grid: GridSize::new(4, 3).unwrap(),
        weights: ncnet_core::SynapticWeights {
            l2pyr_l2pyr_ampa: 0.05,
            l5pyr_l5basket: 0.02,
            ..Default::default()
        },
        feeds: vec![
            FeedConfig {
                name: "alpha".into(),
                kind: "rhythmic".into(),
                start: 20.0,
                frequency: 10.0,
                stdev: 5.0,
                repeats: 3,
                targets: all(target(0.01, 0.0, 0.0)),
                ..Default::default()
            },
            FeedConfig {
                name: "beta".into(),
                kind: "rhythmic".into(),
                randomize_start: true,
                frequency: 20.0,
                stdev: 2.0,
                distribution: Distribution::Uniform,
                location: ncnet_core::Location::Distal,
                targets: all(target(0.02, 0.0, 0.0)),
                ..Default::default()
            },
            FeedConfig {
                name: "evprox1".into(),
                kind: "evoked".into(),
                mean: 26.0,
                numspikes: 2,
                lamtha: 3.0,
                seedcore: 2,
                targets: all(target(0.01, 2.5, 0.0)),
                ..Default::default()
            },
            FeedConfig {
                name: "extgauss".into(),
                kind: "gaussian".into(),
                seedcore: 3,
                targets: all(target(0.01, 10.0, 0.0)),
                ..Default::default()
            },
            FeedConfig {
                name: "extpois".into(),
                kind: "poisson".into(),
                seedcore: 4,
                start: 10.0,
                targets: all(target(0.01, 0.0, 40.0)),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn serial(config: &NetworkConfig) -> Snapshot {
    let mut assembler = NetworkAssembler::new(config.clone(), SingleProcess).unwrap();
    assembler.assemble().unwrap();
    snapshot(&assembler).unwrap()
}

fn distributed(config: &NetworkConfig, ranks: usize) -> Snapshot {
    let parts = LocalCluster::run(ranks, |comm| {
        let mut assembler = NetworkAssembler::new(config.clone(), comm)?;
        assembler.assemble()?;
        snapshot(&assembler)
    })
    .unwrap();
    Snapshot::merge(parts)
}

#[test]
fn serial_run_covers_every_gid() {
    let config = busy_config();
    let snap = serial(&config);
    // 12 pyramidal and 5 basket cells per layer
    assert_eq!(snap.edges.len(), 34);
    // 2 shared inputs, 3 per-cell kinds
    assert_eq!(snap.events.len(), 2 + 3 * 34);
    assert!(snap.events.values().any(|e| !e.is_empty()));
    for events in snap.events.values() {
        assert!(events.windows(2).all(|w| w[0] <= w[1]));
        assert!(events.iter().all(|&t| t > 0.0 && t < config.tstop));
    }
}

#[test]
fn rank_count_does_not_change_the_network() {
    let config = busy_config();
    let reference = serial(&config);
    for ranks in [2, 3, 5] {
        assert_eq!(distributed(&config, ranks), reference, "{} ranks", ranks);
    }
}

#[test]
fn more_ranks_than_cells() {
    let config = NetworkConfig {
        grid: GridSize::new(1, 1).unwrap(),
        ..busy_config()
    };
    let reference = serial(&config);
    assert_eq!(distributed(&config, 8), reference);
}

#[test]
fn reseeding_matches_a_fresh_serial_run_per_trial() {
    let config = busy_config();

    let per_rank = LocalCluster::run(3, |comm| {
        let mut assembler = NetworkAssembler::new(config.clone(), comm)?;
        assembler.assemble()?;
        let first = snapshot(&assembler)?;
        assembler.reseed_for_trial(2)?;
        assembler.finalize()?;
        let third = snapshot(&assembler)?;
        Ok((first, third))
    })
    .unwrap();
    let (first, third): (Vec<_>, Vec<_>) = per_rank.into_iter().unzip();
    let first = Snapshot::merge(first);
    let third = Snapshot::merge(third);

    let mut assembler = NetworkAssembler::new(config, SingleProcess).unwrap();
    assembler.compute_layout().unwrap();
    assembler.allocate_gids().unwrap();
    assembler.partition().unwrap();
    assembler.build_local_agents().unwrap();
    assembler.build_connections().unwrap();
    assembler.generate_feeds(2).unwrap();
    assembler.finalize().unwrap();
    let direct = snapshot(&assembler).unwrap();

    assert_eq!(third, direct);
    assert_eq!(third.edges, first.edges);
    assert_ne!(third.events, first.events);
}

#[test]
fn entropy_offset_is_agreed_on_by_every_rank() {
    let mut config = busy_config();
    config.seed_policy = TrialSeedPolicy::Entropy;
    config.feeds[2].synchronous = true;
    let evoked_start = {
        let assembler = ncnet_core::assemble_serial(config.clone()).unwrap();
        assembler
            .gid_space()
            .unwrap()
            .range(&ncnet_core::Population::Unique("evprox1".into()))
            .unwrap()
            .start
    };

    let snap = distributed(&config, 4);
    // synchronous evoked instances share one stream, so every cell of a type
    // sees the same train regardless of the rank it lives on
    let l2pyr: Vec<&Vec<f64>> = (5..17)
        .map(|cell| &snap.events[&Gid::new(cell + evoked_start)])
        .collect();
    assert!(!l2pyr[0].is_empty());
    assert!(l2pyr.iter().all(|e| *e == l2pyr[0]));
}
