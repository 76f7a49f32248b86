//! Network assembly state machine
//!
//! A rank walks through a fixed sequence of steps: layout, gid allocation,
//! partition, local agents, connections, feeds. Every step is valid only in
//! the state left by the previous one. A failing step leaves the assembler
//! in the state it was in, so partially built data is never visible.

use core::fmt;
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::comm::Communicator;
use crate::config::NetworkConfig;
use crate::connect::{ConnectionBuilder, Edge, IncomingEdges, InputProjection, LocalCell};
use crate::error::{NetError, Result};
use crate::feed::FeedSpec;
use crate::gid::{Gid, GidSpace};
use crate::layout::{Position, SpatialLayout};
use crate::partition::RankPartition;
use crate::population::{CellType, Population};
use crate::rng::{FeedSeeds, RandomStreamFactory};
use crate::wiring::WiringTable;

/// Assembly progress of one rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssemblyState {
    /// Nothing computed yet
    Unconfigured,
    /// Positions known
    LayoutComputed,
    /// Gid ranges known
    GidsAllocated,
    /// Owned gids known
    Partitioned,
    /// Local cells and input placeholders created
    LocalAgentsBuilt,
    /// Incoming edges of local cells created
    ConnectionsBuilt,
    /// Input events generated for the current trial
    FeedsGenerated,
    /// Ready to be handed to the solver
    Ready,
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Receiver of an assembled network on the solver side
pub trait SolverSink {
    /// Register one edge
    fn attach(&mut self, edge: &Edge) -> Result<()>;

    /// Load the event times an input plays back
    fn play(&mut self, gid: Gid, events: &[f64]) -> Result<()>;
}

/// An external input instance owned by this rank
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFeed {
    /// Gid of the instance
    pub gid: Gid,
    /// Population the instance belongs to
    pub population: Population,
    /// Cell driven by a per-cell input
    pub owner: Option<(Gid, CellType)>,
    /// Seeds used for the current trial, if the instance generates events
    pub seeds: Option<FeedSeeds>,
    /// Event times for the current trial (ms)
    pub events: Vec<f64>,
    spec: usize,
}

/// Per-rank counts of an assembled network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssemblySummary {
    /// Rank the counts belong to
    pub rank: usize,
    /// Trial of the current events
    pub trial: u32,
    /// Local cells
    pub cells: usize,
    /// Incoming edges of local cells
    pub edges: usize,
    /// Local input instances
    pub feeds: usize,
    /// Events over all local input instances
    pub events: usize,
}

/// Builds the local part of the network on one rank
pub struct NetworkAssembler<C: Communicator> {
    comm: C,
    config: NetworkConfig,
    specs: Vec<FeedSpec>,
    table: WiringTable,
    state: AssemblyState,
    layout: Option<SpatialLayout>,
    space: Option<GidSpace>,
    partition: Option<RankPartition>,
    cells: Vec<LocalCell>,
    edges: BTreeMap<Gid, IncomingEdges>,
    feeds: Vec<LocalFeed>,
    trial: u32,
}

impl<C: Communicator> NetworkAssembler<C> {
    /// Create an assembler for this rank
    pub fn new(config: NetworkConfig, comm: C) -> Result<Self> {
        config.validate()?;
        let specs = config.feed_specs()?;
        let table = WiringTable::standard(&config.weights);
        Ok(Self {
            comm,
            config,
            specs,
            table,
            state: AssemblyState::Unconfigured,
            layout: None,
            space: None,
            partition: None,
            cells: Vec::new(),
            edges: BTreeMap::new(),
            feeds: Vec::new(),
            trial: 0,
        })
    }

    /// Current state
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Rank of this assembler
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Run every step for trial 0 and finalize
    pub fn assemble(&mut self) -> Result<()> {
        self.compute_layout()?;
        self.allocate_gids()?;
        self.partition()?;
        self.build_local_agents()?;
        self.build_connections()?;
        self.generate_feeds(0)?;
        self.finalize()
    }

    /// Compute the positions of every population
    pub fn compute_layout(&mut self) -> Result<()> {
        self.require("compute_layout", AssemblyState::Unconfigured)?;
        self.layout = Some(SpatialLayout::new(self.config.grid)?);
        self.advance(AssemblyState::LayoutComputed);
        Ok(())
    }

    /// Allocate the gid ranges
    pub fn allocate_gids(&mut self) -> Result<()> {
        self.require("allocate_gids", AssemblyState::LayoutComputed)?;
        let layout = self.layout("allocate_gids")?;
        let space = GidSpace::for_feeds(layout, &self.specs)?;
        log::info!(
            "Allocated {} gids ({} cells, {} per-cell input kinds)",
            space.total(),
            space.cell_count(),
            space.unique_names().count()
        );
        self.space = Some(space);
        self.advance(AssemblyState::GidsAllocated);
        Ok(())
    }

    /// Determine the gids owned by this rank
    pub fn partition(&mut self) -> Result<()> {
        self.require("partition", AssemblyState::GidsAllocated)?;
        let space = self.space("partition")?;
        let partition = RankPartition::new(space, self.comm.rank(), self.comm.size())?;
        self.partition = Some(partition);
        self.advance(AssemblyState::Partitioned);
        Ok(())
    }

    /// Create local cells and input placeholders
    pub fn build_local_agents(&mut self) -> Result<()> {
        self.require("build_local_agents", AssemblyState::Partitioned)?;
        let builder = self.builder("build_local_agents")?;
        let space = self.space("build_local_agents")?;
        let partition = self.partition_ref("build_local_agents")?;

        let shared = self.shared_specs();
        let unique = self.unique_specs(space);

        let mut cells = Vec::with_capacity(partition.groups().len());
        let mut feeds = Vec::new();
        for group in partition.groups() {
            let cell = builder.local_cell(group.cell)?;
            for (&gid, &(_, spec)) in group.feeds.iter().zip(&unique) {
                feeds.push(LocalFeed {
                    gid,
                    population: space.gid_to_population(gid)?.clone(),
                    owner: Some((cell.gid, cell.cell_type)),
                    seeds: None,
                    events: Vec::new(),
                    spec,
                });
            }
            cells.push(cell);
        }
        for &gid in partition.extinputs() {
            let (_, index) = space.locate(gid)?;
            let spec = *shared.get(index).ok_or(NetError::GidOutOfRange {
                gid,
                total: space.total(),
            })?;
            feeds.push(LocalFeed {
                gid,
                population: Population::ExtInput,
                owner: None,
                seeds: None,
                events: Vec::new(),
                spec,
            });
        }
        feeds.sort_by_key(|f| f.gid);

        log::debug!(
            "Rank {} built {} cells and {} input instances",
            self.comm.rank(),
            cells.len(),
            feeds.len()
        );
        self.cells = cells;
        self.feeds = feeds;
        self.advance(AssemblyState::LocalAgentsBuilt);
        Ok(())
    }

    /// Create the incoming edges of every local cell
    ///
    /// Cell edges come first, then every shared input, then the cell's
    /// private inputs in name order.
    pub fn build_connections(&mut self) -> Result<()> {
        self.require("build_connections", AssemblyState::LocalAgentsBuilt)?;
        let builder = self.builder("build_connections")?;
        let space = self.space("build_connections")?;
        let origin = self.layout("build_connections")?.origin();

        let mut per_cell = builder.cell_edges_all(&self.cells)?;

        let shared_start = space
            .range(&Population::ExtInput)
            .map(|r| r.start)
            .unwrap_or(0);
        let shared: Vec<(Gid, &FeedSpec)> = self
            .shared_specs()
            .into_iter()
            .enumerate()
            .map(|(i, spec)| (Gid::new(shared_start + i as u32), &self.specs[spec]))
            .collect();
        let unique: Vec<(u32, &FeedSpec)> = self
            .unique_specs(space)
            .into_iter()
            .map(|(start, spec)| (start, &self.specs[spec]))
            .collect();

        for (cell, edges) in self.cells.iter().zip(per_cell.iter_mut()) {
            for &(gid, spec) in &shared {
                connect_feed(&builder, cell, gid, spec, origin, edges)?;
            }
            for &(start, spec) in &unique {
                let gid = Gid::new(cell.gid.raw() + start);
                connect_feed(&builder, cell, gid, spec, origin, edges)?;
            }
        }

        let edges: BTreeMap<Gid, IncomingEdges> = self
            .cells
            .iter()
            .map(|c| c.gid)
            .zip(per_cell)
            .collect();
        log::info!(
            "Rank {} created {} edges onto {} cells",
            self.comm.rank(),
            edges.values().map(IncomingEdges::len).sum::<usize>(),
            edges.len()
        );
        self.edges = edges;
        self.advance(AssemblyState::ConnectionsBuilt);
        Ok(())
    }

    /// Generate the events of every local input for a trial
    ///
    /// Blocks until every rank has the trial's seed offset.
    pub fn generate_feeds(&mut self, trial: u32) -> Result<()> {
        self.require("generate_feeds", AssemblyState::ConnectionsBuilt)?;
        self.regenerate(trial)
    }

    /// Move from generated feeds to the ready state
    pub fn finalize(&mut self) -> Result<()> {
        self.require("finalize", AssemblyState::FeedsGenerated)?;
        self.advance(AssemblyState::Ready);
        Ok(())
    }

    /// Regenerate every local input for another trial
    ///
    /// Partition and connections are untouched. Leaves the assembler in
    /// [`AssemblyState::FeedsGenerated`]; call [`finalize`](Self::finalize)
    /// before reading it again.
    pub fn reseed_for_trial(&mut self, trial: u32) -> Result<()> {
        self.require("reseed_for_trial", AssemblyState::Ready)?;
        log::info!("Rank {} reseeding for trial {}", self.comm.rank(), trial);
        self.regenerate(trial)
    }

    /// Local cells in gid order
    pub fn local_cells(&self) -> Result<&[LocalCell]> {
        self.require("local_cells", AssemblyState::Ready)?;
        Ok(&self.cells)
    }

    /// Incoming edges of a local cell
    pub fn incoming_edges(&self, gid: Gid) -> Result<&IncomingEdges> {
        self.require("incoming_edges", AssemblyState::Ready)?;
        self.edges.get(&gid).ok_or(NetError::NotLocal {
            gid,
            what: "cell",
            rank: self.rank(),
        })
    }

    /// Local input instances in gid order
    pub fn local_feeds(&self) -> Result<&[LocalFeed]> {
        self.require("local_feeds", AssemblyState::Ready)?;
        Ok(&self.feeds)
    }

    /// Events of a local input instance
    pub fn feed_events(&self, gid: Gid) -> Result<&[f64]> {
        self.require("feed_events", AssemblyState::Ready)?;
        self.feeds
            .binary_search_by_key(&gid, |f| f.gid)
            .map(|i| self.feeds[i].events.as_slice())
            .map_err(|_| NetError::NotLocal {
                gid,
                what: "input",
                rank: self.rank(),
            })
    }

    /// Population and local index of any gid
    pub fn locate(&self, gid: Gid) -> Result<(&Population, usize)> {
        self.require("locate", AssemblyState::Ready)?;
        self.space("locate")?.locate(gid)
    }

    /// Gid space of the network
    pub fn gid_space(&self) -> Result<&GidSpace> {
        self.require("gid_space", AssemblyState::Ready)?;
        self.space("gid_space")
    }

    /// Partition of this rank
    pub fn rank_partition(&self) -> Result<&RankPartition> {
        self.require("rank_partition", AssemblyState::Ready)?;
        self.partition_ref("rank_partition")
    }

    /// Spatial layout of the network
    pub fn spatial_layout(&self) -> Result<&SpatialLayout> {
        self.require("spatial_layout", AssemblyState::Ready)?;
        self.layout("spatial_layout")
    }

    /// Counts of the local network
    pub fn summary(&self) -> Result<AssemblySummary> {
        self.require("summary", AssemblyState::Ready)?;
        Ok(AssemblySummary {
            rank: self.comm.rank(),
            trial: self.trial,
            cells: self.cells.len(),
            edges: self.edges.values().map(IncomingEdges::len).sum(),
            feeds: self.feeds.len(),
            events: self.feeds.iter().map(|f| f.events.len()).sum(),
        })
    }

    /// Hand every local edge and input sequence to the solver
    pub fn export_to<S: SolverSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        self.require("export_to", AssemblyState::Ready)?;
        for edges in self.edges.values() {
            for edge in edges.iter() {
                sink.attach(edge)?;
            }
        }
        for feed in &self.feeds {
            sink.play(feed.gid, &feed.events)?;
        }
        Ok(())
    }

    fn regenerate(&mut self, trial: u32) -> Result<()> {
        let factory = RandomStreamFactory::for_trial(&self.comm, self.config.seed_policy, trial)?;
        let horizon = self.config.tstop;
        let specs = &self.specs;

        let generate = |feed: &LocalFeed| -> Result<(Option<FeedSeeds>, Vec<f64>)> {
            let spec = &specs[feed.spec];
            match spec.kind_for(feed.owner.map(|(_, t)| t)) {
                Some(kind) => {
                    let seeds = kind.seeds(&factory, spec.seedcore, feed.gid);
                    let events = kind.generate(seeds, trial, horizon)?;
                    Ok((Some(seeds), events))
                }
                // the owner's type is not a target of this input
                None => Ok((None, Vec::new())),
            }
        };

        #[cfg(feature = "parallel")]
        let generated: Vec<_> = self
            .feeds
            .par_iter()
            .map(generate)
            .collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let generated: Vec<_> = self.feeds.iter().map(generate).collect::<Result<_>>()?;

        for (feed, (seeds, events)) in self.feeds.iter_mut().zip(generated) {
            feed.seeds = seeds;
            feed.events = events;
        }
        self.trial = trial;
        log::debug!(
            "Rank {} generated {} events for trial {}",
            self.comm.rank(),
            self.feeds.iter().map(|f| f.events.len()).sum::<usize>(),
            trial
        );
        self.advance(AssemblyState::FeedsGenerated);
        Ok(())
    }

    /// Shared inputs in configuration order, matching their local index
    fn shared_specs(&self) -> Vec<usize> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_shared())
            .map(|(i, _)| i)
            .collect()
    }

    /// Per-cell inputs as (range start, spec) in gid order
    fn unique_specs(&self, space: &GidSpace) -> Vec<(u32, usize)> {
        let mut unique: Vec<(u32, usize)> = self
            .specs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_shared())
            .filter_map(|(i, s)| {
                space
                    .range(&Population::Unique(s.name.clone()))
                    .map(|r| (r.start, i))
            })
            .collect();
        unique.sort_unstable();
        unique
    }

    fn require(&self, operation: &'static str, expected: AssemblyState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NetError::ordering(operation, self.state))
        }
    }

    fn advance(&mut self, next: AssemblyState) {
        log::trace!("Rank {}: {} -> {}", self.comm.rank(), self.state, next);
        self.state = next;
    }

    fn layout(&self, operation: &'static str) -> Result<&SpatialLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| NetError::ordering(operation, self.state))
    }

    fn space(&self, operation: &'static str) -> Result<&GidSpace> {
        self.space
            .as_ref()
            .ok_or_else(|| NetError::ordering(operation, self.state))
    }

    fn partition_ref(&self, operation: &'static str) -> Result<&RankPartition> {
        self.partition
            .as_ref()
            .ok_or_else(|| NetError::ordering(operation, self.state))
    }

    fn builder(&self, operation: &'static str) -> Result<ConnectionBuilder<'_>> {
        Ok(ConnectionBuilder::new(
            &self.table,
            self.layout(operation)?,
            self.space(operation)?,
            self.config.threshold,
        ))
    }
}

fn connect_feed(
    builder: &ConnectionBuilder<'_>,
    cell: &LocalCell,
    source: Gid,
    spec: &FeedSpec,
    origin: Position,
    edges: &mut IncomingEdges,
) -> Result<()> {
    let Some(target) = spec.targets.get(&cell.cell_type) else {
        return Ok(());
    };
    let projection = InputProjection {
        source,
        position: origin,
        weights: target.weights,
        delay: target.delay,
        lamtha: spec.lamtha,
        location: spec.location,
        receptors: spec.receptors(),
    };
    builder.connect_input(cell, &projection, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcess;
    use crate::config::{FeedConfig, FeedTargetConfig};
    use crate::layout::GridSize;
    use crate::population::{Receptor, Section, SynapseSite};

    fn small_config() -> NetworkConfig {
        let mut targets = BTreeMap::new();
        targets.insert(
            CellType::L2Pyramidal,
            FeedTargetConfig {
                ampa: 0.01,
                delay: 0.1,
                sigma: 0.0,
                ..Default::default()
            },
        );
        NetworkConfig {
            tstop: 170.0,
            grid: GridSize::new(3, 3).unwrap(),
            feeds: vec![
                FeedConfig {
                    name: "alpha".into(),
                    kind: "rhythmic".into(),
                    start: 100.0,
                    stop: Some(150.0),
                    frequency: 100.0,
                    stdev: 0.0,
                    events_per_cycle: 1,
                    targets: [(CellType::L5Pyramidal, FeedTargetConfig::default())]
                        .into_iter()
                        .collect(),
                    ..Default::default()
                },
                FeedConfig {
                    name: "evprox1".into(),
                    kind: "evoked".into(),
                    mean: 26.0,
                    numspikes: 2,
                    lamtha: 3.0,
                    targets,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        edges: usize,
        played: Vec<(Gid, usize)>,
    }

    impl SolverSink for RecordingSink {
        fn attach(&mut self, _edge: &Edge) -> Result<()> {
            self.edges += 1;
            Ok(())
        }

        fn play(&mut self, gid: Gid, events: &[f64]) -> Result<()> {
            self.played.push((gid, events.len()));
            Ok(())
        }
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut assembler = NetworkAssembler::new(small_config(), SingleProcess).unwrap();
        let err = assembler.build_connections().unwrap_err();
        assert!(err.is_ordering());
        assert_eq!(assembler.state(), AssemblyState::Unconfigured);

        assembler.compute_layout().unwrap();
        assert!(assembler.compute_layout().unwrap_err().is_ordering());
        assert!(assembler.local_cells().unwrap_err().is_ordering());
        assert!(assembler.reseed_for_trial(1).unwrap_err().is_ordering());
    }

    #[test]
    fn test_step_by_step() {
        let mut assembler = NetworkAssembler::new(small_config(), SingleProcess).unwrap();
        assembler.compute_layout().unwrap();
        assembler.allocate_gids().unwrap();
        assembler.partition().unwrap();
        assembler.build_local_agents().unwrap();
        assembler.build_connections().unwrap();
        assembler.generate_feeds(0).unwrap();
        assert_eq!(assembler.state(), AssemblyState::FeedsGenerated);
        assert!(assembler.local_feeds().unwrap_err().is_ordering());
        assembler.finalize().unwrap();
        assert_eq!(assembler.state(), AssemblyState::Ready);
    }

    #[test]
    fn test_assembled_network() {
        let mut assembler = NetworkAssembler::new(small_config(), SingleProcess).unwrap();
        assembler.assemble().unwrap();

        // 24 cells, 1 shared input at 24, evprox1 at 25..49
        let space = assembler.gid_space().unwrap();
        assert_eq!(space.total(), 49);
        assert_eq!(assembler.local_cells().unwrap().len(), 24);
        assert_eq!(assembler.local_feeds().unwrap().len(), 25);

        assert_eq!(
            assembler.feed_events(Gid::new(24)).unwrap(),
            &[100.0, 110.0, 120.0, 130.0, 140.0]
        );
        // first L2 pyramidal cell is gid 3, its evoked input is gid 28
        assert_eq!(assembler.feed_events(Gid::new(28)).unwrap(), &[26.0, 26.0]);
        // baskets are not evoked targets: slot kept, no events
        assert!(assembler.feed_events(Gid::new(25)).unwrap().is_empty());

        let edges = assembler.incoming_edges(Gid::new(3)).unwrap();
        let basal = SynapseSite::new(Section::Basal2, Receptor::Ampa);
        let from_evoked: Vec<_> = edges
            .site(&basal)
            .iter()
            .filter(|e| e.source == Gid::new(28))
            .collect();
        assert_eq!(from_evoked.len(), 1);

        assert!(assembler.incoming_edges(Gid::new(24)).unwrap_err().is_lookup());
        assert!(assembler.feed_events(Gid::new(3)).unwrap_err().is_lookup());

        let (population, index) = assembler.locate(Gid::new(28)).unwrap();
        assert_eq!(population, &Population::Unique("evprox1".into()));
        assert_eq!(index, 3);
    }

    #[test]
    fn test_shared_input_reaches_every_target_cell() {
        let mut assembler = NetworkAssembler::new(small_config(), SingleProcess).unwrap();
        assembler.assemble().unwrap();
        // L5 pyramidal cells are 15..24
        for raw in 15..24 {
            let edges = assembler.incoming_edges(Gid::new(raw)).unwrap();
            assert_eq!(edges.iter().filter(|e| e.source == Gid::new(24)).count(), 6);
        }
        let edges = assembler.incoming_edges(Gid::new(0)).unwrap();
        assert_eq!(edges.iter().filter(|e| e.source == Gid::new(24)).count(), 0);
    }

    #[test]
    fn test_reseed_keeps_connections() {
        let mut config = small_config();
        config.feeds[1].targets.get_mut(&CellType::L2Pyramidal).unwrap().sigma = 3.0;
        let mut assembler = NetworkAssembler::new(config, SingleProcess).unwrap();
        assembler.assemble().unwrap();
        let edges_before = assembler.summary().unwrap().edges;
        let trial0 = assembler.feed_events(Gid::new(28)).unwrap().to_vec();

        assembler.reseed_for_trial(1).unwrap();
        assert_eq!(assembler.state(), AssemblyState::FeedsGenerated);
        assembler.finalize().unwrap();
        let summary = assembler.summary().unwrap();
        assert_eq!(summary.trial, 1);
        assert_eq!(summary.edges, edges_before);
        assert_ne!(assembler.feed_events(Gid::new(28)).unwrap(), trial0.as_slice());
    }

    #[test]
    fn test_export_to_sink() {
        let mut assembler = NetworkAssembler::new(small_config(), SingleProcess).unwrap();
        let mut sink = RecordingSink::default();
        assert!(assembler.export_to(&mut sink).unwrap_err().is_ordering());

        assembler.assemble().unwrap();
        assembler.export_to(&mut sink).unwrap();
        let summary = assembler.summary().unwrap();
        assert_eq!(sink.edges, summary.edges);
        assert_eq!(sink.played.len(), summary.feeds);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let mut config = small_config();
        config.feeds[0].kind = "burst".into();
        let err = NetworkAssembler::new(config, SingleProcess).err().unwrap();
        assert!(err.is_configuration());
    }
}
