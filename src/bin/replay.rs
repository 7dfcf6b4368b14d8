//! replay - run a recorded detection log through the event tracker

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use phone_shamer::detect::read_detection_log;
use phone_shamer::{classify, EventTracker, TrackerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON-lines detection log, one frame per line.
    log: PathBuf,
    /// Consecutive overlapping frames required to confirm an event.
    #[arg(long, default_value_t = 5)]
    frames: usize,
    /// Seconds after an event ends before another can start.
    #[arg(long, default_value_t = 10.0)]
    cooldown_secs: f64,
    /// Print the overlap outcome of every frame.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let cooldown = Duration::try_from_secs_f64(args.cooldown_secs)?;
    let mut tracker = EventTracker::new(TrackerConfig::new(args.frames, cooldown));
    let records = read_detection_log(&args.log)?;

    let mut started = 0u64;
    for (idx, record) in records.iter().enumerate() {
        if args.verbose {
            println!(
                "frame {:>5} {} overlap={}",
                idx + 1,
                record.timestamp.to_rfc3339(),
                classify(&record.frame).is_found()
            );
        }
        if let Some(ev) = tracker.process(&record.frame, record.timestamp) {
            started += 1;
            println!(
                "START {} event={} person={:?} phone={:?}",
                ev.event.start_time.to_rfc3339(),
                ev.event.event_id,
                ev.event.person_bbox.to_array(),
                ev.event.phone_bbox.to_array()
            );
        }
        if let Some(ended) = tracker.take_ended_event() {
            println!(
                "END   {} event={} frames={}",
                record.timestamp.to_rfc3339(),
                ended.event_id,
                ended.frame_count
            );
        }
    }

    if let Some(active) = tracker.active_event() {
        println!(
            "ACTIVE event={} frames={} (log ended mid-event)",
            active.event_id, active.frame_count
        );
    }
    println!("{} frames, {} events", records.len(), started);
    Ok(())
}
