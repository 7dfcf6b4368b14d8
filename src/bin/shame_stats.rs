//! shame_stats - print phone usage statistics from the event database

use anyhow::{anyhow, Result};
use chrono::{Days, Local};
use clap::Parser;
use std::path::Path;

use phone_shamer::stats::{daily_counts, hourly_counts, render_report, summary};
use phone_shamer::{EventStore, SqliteEventStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the event database.
    #[arg(long, env = "PHONE_SHAMER_DB_PATH", default_value = "data/phone_shamer.db")]
    db_path: String,
    /// Days shown in the daily breakdown.
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=3660))]
    days: u32,
    /// Number of recent events listed.
    #[arg(long, default_value_t = 10)]
    recent: usize,
    /// Delete events older than this many days before printing.
    #[arg(long, value_name = "DAYS")]
    prune_days: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !Path::new(&args.db_path).exists() {
        return Err(anyhow!(
            "database {} not found; run shamerd first to collect data",
            args.db_path
        ));
    }

    let mut store = SqliteEventStore::open(&args.db_path)?;
    let today = Local::now().date_naive();

    if let Some(days) = args.prune_days {
        let removed = match Local::now()
            .naive_local()
            .checked_sub_days(Days::new(u64::from(days)))
        {
            Some(cutoff) => store.delete_before(cutoff)?,
            None => 0,
        };
        println!("removed {} events older than {} days", removed, days);
    }

    let report = render_report(
        &summary(&store, today)?,
        &daily_counts(&store, today, args.days)?,
        &hourly_counts(&store, today)?,
        &store.recent_events(args.recent)?,
    );
    print!("{}", report);
    Ok(())
}
