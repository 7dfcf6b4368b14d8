//! Capture → detect → track → persist loop.
//!
//! `Monitor::step` handles exactly one captured frame. `Monitor::run` drives
//! `step` until asked to stop. Per-frame failures are logged and the loop
//! keeps going; only connecting the source is fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};

use crate::config::ShamerConfig;
use crate::detect::{BackendRegistry, DetectionFrame};
use crate::event::PhoneUsageEvent;
use crate::frame::RawFrame;
use crate::gesture::{ControlSignal, GestureController, GestureRecognizer};
use crate::ingest::{open_source, FrameSource};
use crate::screenshot::ScreenshotStore;
use crate::stats;
use crate::storage::{EventStore, SqliteEventStore};
use crate::tracker::{EventTracker, TrackerConfig};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// What one call to `Monitor::step` did.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Dropped by frame skipping.
    Skipped,
    /// Gesture control has monitoring paused.
    Paused,
    Processed(FrameReport),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub overlap: bool,
    pub started: Option<PhoneUsageEvent>,
    /// Event that ended on this frame, with its final frame count.
    pub ended: Option<PhoneUsageEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames_captured: u64,
    pub frames_processed: u64,
    pub events_started: u64,
    pub events_ended: u64,
    pub frame_errors: u64,
}

struct GestureGate {
    recognizer: Box<dyn GestureRecognizer>,
    controller: GestureController,
    armed: bool,
}

pub struct Monitor {
    source: Box<dyn FrameSource>,
    detectors: BackendRegistry,
    tracker: EventTracker,
    screenshots: ScreenshotStore,
    store: Box<dyn EventStore>,
    gesture: Option<GestureGate>,
    frame_skip: u32,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(
        source: Box<dyn FrameSource>,
        detectors: BackendRegistry,
        tracker: TrackerConfig,
        screenshots: ScreenshotStore,
        store: Box<dyn EventStore>,
    ) -> Self {
        Self {
            source,
            detectors,
            tracker: EventTracker::new(tracker),
            screenshots,
            store,
            gesture: None,
            frame_skip: 1,
            stats: MonitorStats::default(),
        }
    }

    /// Wire up every component from a validated config.
    ///
    /// Gesture control needs a recognizer, which only `with_gesture_control`
    /// can supply, so a config with gestures enabled is rejected.
    pub fn from_config(cfg: &ShamerConfig) -> Result<Self> {
        if cfg.gesture.enabled {
            return Err(anyhow!(
                "gesture.enabled requires a gesture recognizer; none is built in"
            ));
        }
        let source = open_source(&cfg.camera)?;
        let detectors = BackendRegistry::from_settings(&cfg.detection)?;
        let store = SqliteEventStore::open(&cfg.storage.database_path)?;
        let screenshots =
            ScreenshotStore::from_settings(&cfg.storage.screenshots_base_path, &cfg.screenshot);
        Ok(Self::new(
            source,
            detectors,
            cfg.tracker_config(),
            screenshots,
            Box::new(store),
        )
        .with_frame_skip(cfg.detection.frame_skip))
    }

    /// Process every `n`th captured frame. Zero is treated as one.
    pub fn with_frame_skip(mut self, n: u32) -> Self {
        self.frame_skip = n.max(1);
        self
    }

    /// Gate monitoring on hand gestures. Monitoring starts paused.
    pub fn with_gesture_control(
        mut self,
        recognizer: Box<dyn GestureRecognizer>,
        controller: GestureController,
    ) -> Self {
        self.gesture = Some(GestureGate {
            recognizer,
            controller,
            armed: false,
        });
        self
    }

    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }

    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// False while gesture control has monitoring paused.
    pub fn is_armed(&self) -> bool {
        self.gesture.as_ref().map_or(true, |g| g.armed)
    }

    pub fn connect(&mut self) -> Result<()> {
        self.source.connect()?;
        if let Err(e) = self.detectors.warm_up_all() {
            log::warn!("detector warm-up failed: {}", e);
        }
        Ok(())
    }

    /// Capture and handle one frame.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let frame = self.source.next_frame()?;
        self.stats.frames_captured += 1;
        let now = frame.captured_at;

        if !self.apply_gestures(&frame, now) {
            return Ok(StepOutcome::Paused);
        }

        if self.stats.frames_captured % u64::from(self.frame_skip) != 0 {
            return Ok(StepOutcome::Skipped);
        }

        let detections = self.detectors.detect(&frame)?;
        self.stats.frames_processed += 1;

        let started = self.tracker.process(&detections, now);
        let mut report = FrameReport {
            overlap: self.tracker.window().latest().unwrap_or(false),
            ..FrameReport::default()
        };
        if let Some(started) = started {
            self.on_event_started(&frame, &started.event, &detections);
            report.started = Some(started.event);
        }
        report.ended = self.persist_ended_event();
        Ok(StepOutcome::Processed(report))
    }

    /// Run until `stop` is set. An event still active at shutdown is not persisted
    /// again; its stored row keeps the count it was inserted with.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<MonitorStats> {
        self.connect()?;
        let mut last_health_log = Instant::now();

        while !stop.load(Ordering::SeqCst) {
            if let Err(e) = self.step() {
                self.stats.frame_errors += 1;
                log::warn!("frame skipped after error: {:#}", e);
                std::thread::sleep(ERROR_BACKOFF);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let source = self.source.stats();
                log::info!(
                    "camera health={} frames={} processed={} events={} device={}",
                    self.source.is_healthy(),
                    source.frames_captured,
                    self.stats.frames_processed,
                    self.stats.events_started,
                    source.device
                );
                last_health_log = Instant::now();
            }
        }

        if let Some(active) = self.tracker.active_event() {
            log::info!(
                "shutting down with event {} still active ({} frames)",
                active.short_id(),
                active.frame_count
            );
        }
        log::info!(
            "monitor stopped: {} frames captured, {} events",
            self.stats.frames_captured,
            self.stats.events_started
        );
        Ok(self.stats)
    }

    /// Returns whether the frame should go on to detection.
    fn apply_gestures(&mut self, frame: &RawFrame, now: DateTime<Utc>) -> bool {
        let Some(gate) = self.gesture.as_mut() else {
            return true;
        };
        let observation = match gate.recognizer.recognize(frame) {
            Ok(obs) => obs,
            Err(e) => {
                log::warn!("gesture recognition failed: {}", e);
                None
            }
        };
        let signal = gate.controller.interpret(observation, now);
        let was_armed = gate.armed;

        match signal {
            Some(ControlSignal::Start) if !was_armed => {
                self.set_armed(true);
                log::info!("monitoring started by gesture");
            }
            Some(ControlSignal::Stop) if was_armed => {
                self.set_armed(false);
                self.tracker.reset(now);
                self.persist_ended_event();
                log::info!("monitoring paused by gesture");
            }
            _ => {}
        }
        self.is_armed()
    }

    fn set_armed(&mut self, armed: bool) {
        if let Some(gate) = self.gesture.as_mut() {
            gate.armed = armed;
        }
    }

    fn on_event_started(
        &mut self,
        frame: &RawFrame,
        event: &PhoneUsageEvent,
        detections: &DetectionFrame,
    ) {
        self.stats.events_started += 1;

        let screenshot = match self.screenshots.save(frame, event, detections) {
            Ok(path) => path,
            Err(e) => {
                log::error!("failed to save screenshot for event {}: {:#}", event.short_id(), e);
                None
            }
        };
        if let Err(e) = self.store.insert_event(event, screenshot.as_deref()) {
            log::error!("failed to store event {}: {:#}", event.short_id(), e);
            return;
        }

        let today = event.start_time.with_timezone(&Local).date_naive();
        match (
            stats::events_on(self.store.as_ref(), today),
            self.store.total_events(),
        ) {
            (Ok(today_count), Ok(total)) => log::info!(
                "phone usage detected: event {} (today: {}, total: {})",
                event.short_id(),
                today_count,
                total
            ),
            _ => log::info!("phone usage detected: event {}", event.short_id()),
        }
    }

    fn persist_ended_event(&mut self) -> Option<PhoneUsageEvent> {
        let ended = self.tracker.take_ended_event()?;
        self.stats.events_ended += 1;
        match self.store.update_frame_count(ended.event_id, ended.frame_count) {
            Ok(true) => log::info!(
                "event {} ended after {} frames",
                ended.short_id(),
                ended.frame_count
            ),
            Ok(false) => log::warn!("ended event {} was never stored", ended.short_id()),
            Err(e) => log::error!("failed to update event {}: {:#}", ended.short_id(), e),
        }
        Some(ended)
    }
}
