//! ncnet CLI crate
//!
//! The binary (src/main.rs) wires up logging and argument parsing and calls
//! [`NcnetCli::execute`]. Commands are exposed as a library so they can be
//! driven from tests without spawning a process.
//!
//! Commands (see [commands]):
//! - assemble: build the network on N in-process ranks, run trials, print per-rank counts.
//! - locate: map a gid to its population, local index and owning rank.
//! - defaults: print the default configuration as TOML.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::NcnetCli;
