//! `glreplay` binary entry point: parses the CLI surface and funnels
//! failures to stderr with a nonzero exit code (spec §7).

use clap::Parser;
use tracing_subscriber::EnvFilter;

use glreplay::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    cli::run(cli)?;
    Ok(())
}
