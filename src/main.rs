//! outpost: polls a remote controller over TCP, executes the commands it
//! sends, and reports results back. See `lib.rs` for the module map.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use outpost::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => outpost::runloop::run_foreground(config.as_deref()),
        Commands::Once { config } => outpost::runloop::run_once(config.as_deref()),
        Commands::Config {
            action: outpost::cli::ConfigAction::Show { config },
        } => outpost::runloop::show_config(config.as_deref()),
    }
}
