use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::constants::{DEFAULT_DB_PATH, DEFAULT_GAP_THRESHOLD_SECS};
use crate::detector;
use crate::store::TickStore;

#[derive(Debug, Args, Clone)]
pub struct GapsArgs {
    /// Path to the tick database
    #[arg(short, long, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Gap threshold in seconds
    #[arg(short, long, default_value_t = DEFAULT_GAP_THRESHOLD_SECS)]
    pub threshold: f64,
}

pub fn run(args: GapsArgs) -> Result<()> {
    let store = TickStore::open(&args.db)?;
    let count = store.tick_count()?;
    println!("{count} ticks recorded in {:?}", args.db);

    if !detector::detect(&store, args.threshold)? {
        println!("No gaps above {}s", args.threshold);
        return Ok(());
    }

    println!("{:>6} | {:^20} | {:^20} | {:>10}", "row", "from", "to", "gap");
    for gap in store.find_gaps(args.threshold)? {
        println!(
            "{:>6} | {:>20} | {:>20} | {:>9.3}s",
            gap.row_index, gap.prev_time, gap.curr_time, gap.gap_seconds
        );
    }
    Ok(())
}
