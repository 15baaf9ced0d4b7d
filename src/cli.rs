use clap::{Parser, Subcommand};

use crate::gaps::GapsArgs;

#[derive(Debug, Parser)]
#[command(author, version, about = "Live market data feed sentinel with gap detection")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(self) -> Command {
        self.command.unwrap_or_default()
    }
}

#[derive(Debug, Subcommand, Default)]
pub enum Command {
    /// Subscribe to the live feed, record ticks and raise gap incidents
    #[default]
    Run,
    /// Scan a recorded tick database and print detected gaps
    Gaps(GapsArgs),
}
