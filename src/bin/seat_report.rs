//! seat_report - print per-region analytics and recent history
//!
//! Read-only companion to seatmond: summarizes the persisted region
//! document and tails the history log.

use anyhow::Result;
use clap::Parser;

use seatmon::store::RegionStore;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the region document.
    #[arg(long, default_value = "seat_config.json", env = "SEATMON_REGIONS_PATH")]
    regions: String,
    /// Path to the history log.
    #[arg(long, default_value = "seat_analytics.csv", env = "SEATMON_HISTORY_PATH")]
    history: String,
    /// Number of recent history rows to print.
    #[arg(long, default_value_t = 10)]
    tail: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let store = RegionStore::open(&args.regions)?;
    if store.is_empty() {
        println!("no regions configured in {}", args.regions);
    } else {
        println!(
            "{:<16} {:<10} {:>12} {:>12} {:>8}",
            "SEAT", "STATUS", "AVAIL MIN", "OCCUP MIN", "EVENTS"
        );
        for region in store.regions() {
            println!(
                "{:<16} {:<10} {:>12.2} {:>12.2} {:>8}",
                region.id,
                region.status.as_str(),
                region.available_minutes,
                region.occupied_minutes,
                region.occupancy_history.len()
            );
        }
    }

    match std::fs::read_to_string(&args.history) {
        Ok(contents) => {
            let lines: Vec<&str> = contents.lines().collect();
            // First line is the header; tail the data rows.
            let rows = lines.len().saturating_sub(1);
            let skip = rows.saturating_sub(args.tail);
            println!("\nhistory ({} rows, showing last {}):", rows, rows - skip);
            if let Some(header) = lines.first() {
                println!("{}", header);
            }
            for line in lines.iter().skip(1 + skip) {
                println!("{}", line);
            }
        }
        Err(e) => {
            println!("\nno history log at {} ({})", args.history, e);
        }
    }

    Ok(())
}
