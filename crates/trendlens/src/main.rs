//! Trendlens CLI: serve the API, run pipeline cycles, poke collectors.

mod cli;

use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
