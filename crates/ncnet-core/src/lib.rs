//! Assembly engine for laminar neocortical column networks
//!
//! This crate lays out the four cell populations of a two-layer column,
//! assigns every cell and external input a global id, partitions those ids
//! over worker ranks and builds, on each rank, the incoming edges of its
//! cells together with the event times of its external inputs. The result
//! is handed to a solver through [`SolverSink`].
//!
//! Assembly is a pure function of [`NetworkConfig`] and the trial index:
//! any number of ranks produces the same edges and events as a single one.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod assembler;
pub mod comm;
pub mod config;
pub mod connect;
pub mod error;
pub mod feed;
pub mod gid;
pub mod layout;
pub mod partition;
pub mod population;
pub mod rng;
pub mod wiring;

pub use assembler::{AssemblyState, AssemblySummary, LocalFeed, NetworkAssembler, SolverSink};
pub use comm::{ClusterComm, Communicator, LocalCluster, SingleProcess};
pub use config::{FeedConfig, FeedTargetConfig, NetworkConfig};
pub use connect::{Edge, IncomingEdges, LocalCell};
pub use error::{NetError, Result};
pub use feed::{FeedKind, FeedKindTag, FeedSpec};
pub use gid::{Gid, GidSpace};
pub use layout::{GridSize, Position, SpatialLayout};
pub use partition::RankPartition;
pub use population::{CellType, Location, Population, Receptor, Section, SynapseSite};
pub use rng::{RandomStreamFactory, TrialSeedPolicy};
pub use wiring::{SynapticWeights, WiringTable};

/// Assembly engine version for compatibility checking
pub const ENGINE_VERSION: u32 = 1;

/// Assemble the network of a serial run for trial 0
pub fn assemble_serial(config: NetworkConfig) -> Result<NetworkAssembler<SingleProcess>> {
    let mut assembler = NetworkAssembler::new(config, SingleProcess)?;
    assembler.assemble()?;
    Ok(assembler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let assembler = assemble_serial(NetworkConfig::default()).unwrap();
        let summary = assembler.summary().unwrap();
        // 35 + 100 + 35 + 100 cells on the default grid
        assert_eq!(summary.cells, 270);
        // extgauss and extpois, one instance per cell each
        assert_eq!(summary.feeds, 540);
        // every default weight is zero
        assert_eq!(summary.events, 0);
    }
}
