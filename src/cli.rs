//! CLI argument definitions for outpost.
//!
//! Separated from `main.rs` so that other code (and, eventually, shell
//! completion generation) can reference these types without pulling in the
//! binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "outpost")]
#[command(about = "Polls a controller for commands and executes them on this host")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the agent loop in the foreground (connect, handle commands,
    /// sleep, repeat) until told to die or interrupted.
    Run {
        /// Path to the TOML config file. Defaults to `OUTPOST_CONFIG` or
        /// the platform config directory.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run a single session against the configured controller, then exit.
    /// Useful for operational testing without waiting on the sleep loop.
    Once {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration and exit.
    Show {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}
