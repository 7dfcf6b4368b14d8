//! Temporal event tracker.
//!
//! Turns the per-frame overlap signal into discrete phone-usage events:
//!
//! - An event is confirmed only when the last N frames all overlapped.
//! - While active, each further confirmed frame bumps `frame_count`.
//! - An active event ends once the whole window is free of overlap, i.e. after
//!   N consecutive non-overlap frames.
//! - A new event cannot be confirmed until the cooldown since the previous
//!   event's end has elapsed, whether or not an event is currently active.
//!
//! The tracker is single-owner and synchronous. Frames must be fed in capture
//! order; reordering corrupts the window.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::detect::DetectionFrame;
use crate::event::{EventStarted, PhoneUsageEvent};
use crate::overlap::{classify, OverlapResult};

pub const DEFAULT_TEMPORAL_FRAMES: usize = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Window size N. Zero is treated as one.
    pub temporal_consistency_frames: usize,
    pub cooldown: Duration,
}

impl TrackerConfig {
    pub fn new(temporal_consistency_frames: usize, cooldown: Duration) -> Self {
        Self {
            temporal_consistency_frames,
            cooldown,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPORAL_FRAMES, DEFAULT_COOLDOWN)
    }
}

/// Fixed-capacity window of the most recent overlap outcomes.
#[derive(Clone, Debug)]
pub struct ConsistencyWindow {
    samples: VecDeque<bool>,
    capacity: usize,
}

impl ConsistencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest once full.
    pub fn push(&mut self, overlap: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(overlap);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Full and every sample overlapped.
    pub fn all_overlap(&self) -> bool {
        self.is_full() && self.samples.iter().all(|&s| s)
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<bool> {
        self.samples.back().copied()
    }

    pub fn any_overlap(&self) -> bool {
        self.samples.iter().any(|&s| s)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

pub struct EventTracker {
    config: TrackerConfig,
    window: ConsistencyWindow,
    active: Option<PhoneUsageEvent>,
    last_event_end: Option<DateTime<Utc>>,
    ended: Option<PhoneUsageEvent>,
}

impl EventTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            window: ConsistencyWindow::new(config.temporal_consistency_frames),
            config,
            active: None,
            last_event_end: None,
            ended: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn window(&self) -> &ConsistencyWindow {
        &self.window
    }

    /// The in-progress event with its live `frame_count`.
    pub fn active_event(&self) -> Option<&PhoneUsageEvent> {
        self.active.as_ref()
    }

    pub fn last_event_end(&self) -> Option<DateTime<Utc>> {
        self.last_event_end
    }

    /// Take the most recently ended event, with its final `frame_count`.
    ///
    /// Only the latest ended event is retained; it is replaced when another ends.
    pub fn take_ended_event(&mut self) -> Option<PhoneUsageEvent> {
        self.ended.take()
    }

    /// Feed one frame's detections. Call exactly once per processed frame.
    ///
    /// Returns `Some` only when a new event is created.
    pub fn process(
        &mut self,
        detections: &DetectionFrame,
        now: DateTime<Utc>,
    ) -> Option<EventStarted> {
        match classify(detections) {
            OverlapResult::None => {
                self.window.push(false);
                if self.active.is_some() && !self.window.any_overlap() {
                    self.end_active(now);
                }
                None
            }
            OverlapResult::Found { person, phone } => {
                self.window.push(true);
                if !self.window.all_overlap() {
                    return None;
                }
                if self.in_cooldown(now) {
                    return None;
                }
                match self.active.as_mut() {
                    Some(event) => {
                        event.frame_count = event.frame_count.saturating_add(1);
                        None
                    }
                    None => {
                        let event = PhoneUsageEvent::new(now, person.bbox, phone.bbox);
                        log::debug!("tracker: event {} confirmed", event.event_id);
                        self.active = Some(event.clone());
                        Some(EventStarted { event })
                    }
                }
            }
        }
    }

    /// Clear the window. An active event is ended at `now`.
    ///
    /// The cooldown reference survives a reset.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        if self.active.is_some() {
            self.end_active(now);
        }
        self.window.clear();
    }

    /// Cooldown holds while `now - last_event_end < cooldown`. A clock that
    /// moved backwards gives a negative elapsed time and stays in cooldown.
    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let Some(last_end) = self.last_event_end else {
            return false;
        };
        let elapsed = now.signed_duration_since(last_end);
        match elapsed.to_std() {
            Ok(elapsed) => elapsed < self.config.cooldown,
            Err(_) => true,
        }
    }

    fn end_active(&mut self, now: DateTime<Utc>) {
        if let Some(event) = self.active.take() {
            log::debug!(
                "tracker: event {} ended after {} frames",
                event.event_id,
                event.frame_count
            );
            self.last_event_end = Some(now);
            self.ended = Some(event);
        }
    }
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn overlap() -> DetectionFrame {
        DetectionFrame::new(
            vec![Detection::person(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9)],
            vec![Detection::phone(BoundingBox::new(5.0, 5.0, 15.0, 15.0), 0.8)],
        )
    }

    fn apart() -> DetectionFrame {
        DetectionFrame::new(
            vec![Detection::person(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9)],
            vec![Detection::phone(BoundingBox::new(50.0, 50.0, 60.0, 60.0), 0.8)],
        )
    }

    fn tracker(n: usize, cooldown_secs: u64) -> EventTracker {
        EventTracker::new(TrackerConfig::new(n, Duration::from_secs(cooldown_secs)))
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut window = ConsistencyWindow::new(3);
        window.push(false);
        window.push(true);
        window.push(true);
        assert!(window.is_full());
        assert!(!window.all_overlap());
        window.push(true);
        assert_eq!(window.len(), 3);
        assert!(window.all_overlap());
        assert_eq!(window.latest(), Some(true));
        window.push(false);
        assert_eq!(window.latest(), Some(false));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut tr = tracker(0, 0);
        assert_eq!(tr.window().capacity(), 1);
        assert!(tr.process(&overlap(), t(0)).is_some());
    }

    #[test]
    fn partial_window_never_confirms() {
        let mut tr = tracker(3, 10);
        assert!(tr.process(&overlap(), t(0)).is_none());
        assert!(tr.process(&overlap(), t(0)).is_none());
        assert!(tr.process(&apart(), t(0)).is_none());
        assert!(tr.active_event().is_none());
    }

    #[test]
    fn confirms_on_nth_consecutive_overlap() {
        let mut tr = tracker(3, 10);
        tr.process(&overlap(), t(0));
        tr.process(&overlap(), t(0));
        let started = tr.process(&overlap(), t(0)).expect("event started");
        assert_eq!(started.event.frame_count, 1);
        assert_eq!(started.event.start_time, t(0));
        assert_eq!(started.event.person_bbox, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(started.event.phone_bbox, BoundingBox::new(5.0, 5.0, 15.0, 15.0));
    }

    #[test]
    fn single_gap_does_not_end_event() {
        let mut tr = tracker(3, 10);
        for _ in 0..3 {
            tr.process(&overlap(), t(0));
        }
        tr.process(&apart(), t(1));
        assert!(tr.active_event().is_some());
        tr.process(&apart(), t(1));
        assert!(tr.active_event().is_some());
        tr.process(&apart(), t(2));
        assert!(tr.active_event().is_none());
        assert_eq!(tr.last_event_end(), Some(t(2)));
        assert_eq!(tr.take_ended_event().map(|e| e.frame_count), Some(1));
        assert!(tr.take_ended_event().is_none());
    }

    #[test]
    fn overlap_after_gap_needs_full_window_again() {
        let mut tr = tracker(3, 10);
        for _ in 0..4 {
            tr.process(&overlap(), t(0));
        }
        assert_eq!(tr.active_event().map(|e| e.frame_count), Some(2));
        tr.process(&apart(), t(1));
        // Window is [true, true, false]: not all-true, so the count stays put.
        tr.process(&overlap(), t(1));
        tr.process(&overlap(), t(1));
        assert_eq!(tr.active_event().map(|e| e.frame_count), Some(2));
        tr.process(&overlap(), t(1));
        assert_eq!(tr.active_event().map(|e| e.frame_count), Some(3));
    }

    #[test]
    fn cooldown_blocks_even_without_active_event() {
        let mut tr = tracker(1, 10);
        assert!(tr.process(&overlap(), t(0)).is_some());
        tr.process(&apart(), t(2));
        assert!(tr.active_event().is_none());
        assert!(tr.process(&overlap(), t(5)).is_none());
        assert!(tr.process(&overlap(), t(11)).is_none());
        assert!(tr.process(&overlap(), t(12)).is_some());
    }

    #[test]
    fn backwards_clock_stays_in_cooldown() {
        let mut tr = tracker(1, 10);
        tr.process(&overlap(), t(100));
        tr.process(&apart(), t(100));
        assert!(tr.process(&overlap(), t(50)).is_none());
    }

    #[test]
    fn zero_cooldown_allows_immediate_retrigger() {
        let mut tr = tracker(1, 0);
        assert!(tr.process(&overlap(), t(0)).is_some());
        tr.process(&apart(), t(0));
        assert!(tr.process(&overlap(), t(0)).is_some());
    }

    #[test]
    fn reset_ends_active_event_and_clears_window() {
        let mut tr = tracker(2, 10);
        tr.process(&overlap(), t(0));
        tr.process(&overlap(), t(0));
        tr.process(&overlap(), t(0));
        tr.reset(t(3));
        assert!(tr.active_event().is_none());
        assert!(tr.window().is_empty());
        assert_eq!(tr.last_event_end(), Some(t(3)));
        assert_eq!(tr.take_ended_event().map(|e| e.frame_count), Some(2));
    }
}
