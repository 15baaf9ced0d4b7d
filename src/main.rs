use anyhow::Result;
use clap::Parser;
use tick_sentinel::cli::{self, Cli};
use tick_sentinel::gaps;
use tick_sentinel::ingest;

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command() {
        cli::Command::Run => ingest::run().await,
        cli::Command::Gaps(args) => gaps::run(args),
    }
}
