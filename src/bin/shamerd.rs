//! shamerd - phone usage monitor daemon
//!
//! This daemon:
//! 1. Loads configuration (`PHONE_SHAMER_CONFIG` plus env overrides)
//! 2. Opens the camera source and detector backend
//! 3. Confirms phone-usage events over consecutive frames
//! 4. Saves a screenshot and a database row per event
//! 5. Prunes screenshots past the retention window at startup

use anyhow::{anyhow, Result};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use phone_shamer::logging::init_logging;
use phone_shamer::{Monitor, ScreenshotStore, ShamerConfig};

fn main() -> Result<()> {
    let cfg = ShamerConfig::load()?;
    init_logging(&cfg.logging)?;

    log::info!("shamerd v{} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "camera={} {}x{} backend={} frame_skip={}",
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height,
        cfg.detection.backend,
        cfg.detection.frame_skip
    );
    log::info!(
        "temporal_consistency_frames={} cooldown={}s db={}",
        cfg.proximity.temporal_consistency_frames,
        cfg.proximity.cooldown_seconds,
        cfg.storage.database_path
    );

    let screenshots =
        ScreenshotStore::from_settings(&cfg.storage.screenshots_base_path, &cfg.screenshot);
    match screenshots.prune_older_than(Local::now().date_naive(), cfg.screenshot.retention_days) {
        Ok(0) => {}
        Ok(n) => log::info!("pruned {} screenshot folders", n),
        Err(e) => log::warn!("screenshot pruning failed: {}", e),
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    let mut monitor = Monitor::from_config(&cfg)?;
    let stats = monitor.run(&stop)?;
    log::info!(
        "shamerd exiting: {} frames processed, {} events, {} frame errors",
        stats.frames_processed,
        stats.events_started,
        stats.frame_errors
    );
    Ok(())
}
