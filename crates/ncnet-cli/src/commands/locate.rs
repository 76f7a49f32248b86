//! Gid lookup command

use std::path::Path;

use clap::Args;
use ncnet_core::partition::rank_of;
use ncnet_core::{Gid, GidSpace, SpatialLayout};

use crate::config::load_network_config;
use crate::error::CliResult;

/// Look up the population, local index and owning rank of a gid
#[derive(Args, Debug)]
pub struct LocateCommand {
    /// Gid to look up
    pub gid: u32,

    /// Number of ranks to compute the owner for (overrides the configuration)
    #[arg(short = 'n', long)]
    pub ranks: Option<usize>,
}

impl LocateCommand {
    pub fn execute(self, config: Option<&Path>) -> CliResult<()> {
        let network = load_network_config(config)?;
        let ranks = self.ranks.unwrap_or(network.ranks);

        let layout = SpatialLayout::new(network.grid)?;
        let space = GidSpace::for_feeds(&layout, &network.feed_specs()?)?;

        let gid = Gid::new(self.gid);
        let (population, index) = space.locate(gid)?;
        let rank = rank_of(&space, gid, ranks)?;
        println!(
            "gid {}: {} index {} on rank {} of {}",
            gid, population, index, rank, ranks
        );
        Ok(())
    }
}
