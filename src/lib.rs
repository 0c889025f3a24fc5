pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod ingest;
pub mod snapshots;
pub mod utils;

use clap::Parser;

use cli::Cli;

pub async fn run() -> anyhow::Result<()> {
    utils::logging::init();

    let cli = Cli::parse();
    log::debug!("Congestion history starting up...");

    cli.execute().await
}
