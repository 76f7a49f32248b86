//! CLI command implementations for ncnet

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod assemble;
pub mod defaults;
pub mod locate;

/// ncnet - laminar cortical network assembly
#[derive(Parser, Debug)]
#[command(
    name = "ncnet",
    version,
    about = "Assemble laminar neocortical column networks",
    long_about = "ncnet lays out a two-layer cortical column, assigns global ids to cells \
                  and external inputs, partitions them over worker ranks and builds the \
                  connections and input event trains each rank hands to a solver."
)]
pub struct NcnetCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Network configuration file (TOML); defaults when absent
    #[arg(short, long, global = true, env = "NCNET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the network and report per-rank counts
    #[command(alias = "build")]
    Assemble(assemble::AssembleCommand),

    /// Look up the population of a gid
    Locate(locate::LocateCommand),

    /// Print the default configuration
    Defaults(defaults::DefaultsCommand),
}

impl NcnetCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        let config = self.config;
        match self.command {
            Commands::Assemble(cmd) => cmd.execute(config.as_deref()),
            Commands::Locate(cmd) => cmd.execute(config.as_deref()),
            Commands::Defaults(cmd) => cmd.execute(),
        }
    }
}
