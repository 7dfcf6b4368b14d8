use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

use phone_shamer::config::ShamerConfig;
use phone_shamer::gesture::{GestureKind, ScriptedGestures};
use phone_shamer::{
    BackendRegistry, BoundingBox, Detection, DetectionFrame, FrameSource, GestureController,
    Hand, HandGesture, InMemoryEventStore, Monitor, RawFrame, ScreenshotStore, ScriptedBackend,
    SourceStats, StepOutcome, TrackerConfig,
};

/// Emits solid frames one second apart, then fails once exhausted.
struct ClockedSource {
    remaining: usize,
    produced: u64,
}

impl ClockedSource {
    fn new(frames: usize) -> Self {
        Self {
            remaining: frames,
            produced: 0,
        }
    }
}

impl FrameSource for ClockedSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        if self.remaining == 0 {
            return Err(anyhow!("source exhausted"));
        }
        self.remaining -= 1;
        self.produced += 1;
        RawFrame::filled(32, 24, [90, 90, 90], t(self.produced as i64))
    }

    fn is_healthy(&self) -> bool {
        self.remaining > 0
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.produced,
            device: "test://clocked".to_string(),
        }
    }
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn detections(overlap: bool) -> DetectionFrame {
    let phone = if overlap {
        BoundingBox::new(8.0, 8.0, 14.0, 14.0)
    } else {
        BoundingBox::new(24.0, 2.0, 30.0, 8.0)
    };
    DetectionFrame::new(
        vec![Detection::person(BoundingBox::new(2.0, 2.0, 12.0, 20.0), 0.9)],
        vec![Detection::phone(phone, 0.8)],
    )
}

fn monitor(
    pattern: &[bool],
    frames: usize,
    n: usize,
    shots: &std::path::Path,
) -> Monitor {
    let mut registry = BackendRegistry::new();
    registry.register(ScriptedBackend::new(
        pattern.iter().map(|&o| detections(o)).collect(),
    ));
    Monitor::new(
        Box::new(ClockedSource::new(frames)),
        registry,
        TrackerConfig::new(n, Duration::from_secs(10)),
        ScreenshotStore::new(shots),
        Box::new(InMemoryEventStore::new()),
    )
}

#[test]
fn event_is_stored_with_screenshot_and_final_count() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pattern = [true, true, true, false, false];
    let mut monitor = monitor(&pattern, pattern.len(), 2, dir.path());

    let mut started = None;
    let mut ended = None;
    for _ in 0..pattern.len() {
        if let StepOutcome::Processed(report) = monitor.step()? {
            started = started.or(report.started);
            ended = ended.or(report.ended);
        }
    }

    let started = started.expect("event started");
    let ended = ended.expect("event ended");
    assert_eq!(started.event_id, ended.event_id);
    assert_eq!(started.start_time, t(2));
    assert_eq!(ended.frame_count, 2);

    let stored = monitor.store().recent_events(10)?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].event_id, started.event_id);
    assert_eq!(stored[0].frame_count, 2);
    let shot = stored[0].screenshot_path.as_deref().expect("screenshot path");
    assert!(std::path::Path::new(shot).exists());

    let stats = monitor.stats();
    assert_eq!(stats.frames_processed, 5);
    assert_eq!(stats.events_started, 1);
    assert_eq!(stats.events_ended, 1);
    Ok(())
}

#[test]
fn frame_skip_only_processes_every_nth_frame() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut monitor = monitor(&[true; 3], 6, 3, dir.path()).with_frame_skip(2);

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        outcomes.push(monitor.step()?);
    }
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, StepOutcome::Skipped))
        .count();
    assert_eq!(skipped, 3);
    assert_eq!(monitor.stats().frames_processed, 3);
    assert_eq!(monitor.stats().events_started, 1);
    assert!(matches!(outcomes[0], StepOutcome::Skipped));
    Ok(())
}

#[test]
fn gestures_pause_and_resume_monitoring() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let palm = Some(HandGesture {
        hand: Hand::Right,
        gesture: GestureKind::OpenPalm,
        score: 0.9,
    });
    let fist = Some(HandGesture {
        hand: Hand::Right,
        gesture: GestureKind::ClosedFist,
        score: 0.9,
    });
    let gestures = ScriptedGestures::new(vec![None, palm, None, None, fist, None]);
    let mut monitor = monitor(&[true; 6], 6, 2, dir.path()).with_gesture_control(
        Box::new(gestures),
        GestureController::new(Hand::Right, 0.5, Duration::from_secs(1)),
    );

    assert!(!monitor.is_armed());
    assert_eq!(monitor.step()?, StepOutcome::Paused);
    assert!(matches!(monitor.step()?, StepOutcome::Processed(_)));
    assert!(monitor.is_armed());
    monitor.step()?;
    assert!(monitor.tracker().active_event().is_some());
    monitor.step()?;

    // Closed fist pauses, ending the active event and clearing the window.
    assert_eq!(monitor.step()?, StepOutcome::Paused);
    assert!(monitor.tracker().active_event().is_none());
    assert!(monitor.tracker().window().is_empty());
    assert_eq!(monitor.step()?, StepOutcome::Paused);

    let stored = monitor.store().recent_events(10)?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].frame_count, 2);
    Ok(())
}

#[test]
fn run_stops_when_flag_is_set() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut monitor = monitor(&[], 0, 2, dir.path());
    let stop = AtomicBool::new(true);
    let stats = monitor.run(&stop)?;
    assert_eq!(stats.frames_captured, 0);
    Ok(())
}

#[test]
fn report_overlap_follows_each_processed_frame() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pattern = [true, false, true];
    let mut monitor = monitor(&pattern, pattern.len(), 3, dir.path());

    let mut seen = Vec::new();
    for _ in 0..pattern.len() {
        if let StepOutcome::Processed(report) = monitor.step()? {
            seen.push(report.overlap);
        }
    }
    assert_eq!(seen, pattern);
    Ok(())
}

#[test]
fn config_with_gestures_enabled_is_refused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("shamer.toml");
    std::fs::write(
        &config,
        r#"
        [camera]
        device = "stub://desk"

        [gesture]
        enabled = true
        "#,
    )?;
    let cfg = ShamerConfig::load_from(&config)?;
    let err = match Monitor::from_config(&cfg) {
        Ok(_) => return Err(anyhow!("gesture config accepted without a recognizer")),
        Err(e) => e,
    };
    assert!(err.to_string().contains("gesture"));
    Ok(())
}
