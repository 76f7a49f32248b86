//! Default configuration command

use clap::Args;

use crate::config::render_network_config;
use crate::error::CliResult;
use ncnet_core::NetworkConfig;

/// Print the default network configuration as TOML
#[derive(Args, Debug)]
pub struct DefaultsCommand {}

impl DefaultsCommand {
    pub fn execute(self) -> CliResult<()> {
        print!("{}", render_network_config(&NetworkConfig::default())?);
        Ok(())
    }
}
