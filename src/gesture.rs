//! Hand-gesture start/stop control.
//!
//! Recognition itself is external: anything implementing `GestureRecognizer`
//! can report the dominant hand gesture for a frame. `GestureController` turns
//! those observations into rate-limited `ControlSignal`s.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GestureSettings;
use crate::frame::RawFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    OpenPalm,
    ClosedFist,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandGesture {
    pub hand: Hand,
    pub gesture: GestureKind,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Start,
    Stop,
}

pub trait GestureRecognizer: Send {
    /// Most confident hand gesture in the frame, if any.
    fn recognize(&mut self, frame: &RawFrame) -> Result<Option<HandGesture>>;
}

pub struct GestureController {
    hand: Hand,
    min_score: f32,
    cooldown: Duration,
    last_signal_at: Option<DateTime<Utc>>,
}

impl GestureController {
    pub fn new(hand: Hand, min_score: f32, cooldown: Duration) -> Self {
        Self {
            hand,
            min_score,
            cooldown,
            last_signal_at: None,
        }
    }

    pub fn from_settings(settings: &GestureSettings) -> Self {
        Self::new(settings.hand, settings.min_confidence, settings.cooldown())
    }

    /// Map an observation to a control signal.
    ///
    /// Only the configured hand counts and the score must exceed the minimum.
    /// Accepted signals are spaced at least `cooldown` apart.
    pub fn interpret(
        &mut self,
        observation: Option<HandGesture>,
        now: DateTime<Utc>,
    ) -> Option<ControlSignal> {
        let obs = observation?;
        if obs.hand != self.hand || obs.score.is_nan() || obs.score <= self.min_score {
            return None;
        }
        let signal = match obs.gesture {
            GestureKind::OpenPalm => ControlSignal::Start,
            GestureKind::ClosedFist => ControlSignal::Stop,
            GestureKind::Other => return None,
        };
        if let Some(last) = self.last_signal_at {
            let within = match now.signed_duration_since(last).to_std() {
                Ok(elapsed) => elapsed < self.cooldown,
                Err(_) => true,
            };
            if within {
                return None;
            }
        }
        self.last_signal_at = Some(now);
        Some(signal)
    }
}

/// Replays a fixed gesture sequence, one entry per frame.
#[derive(Default)]
pub struct ScriptedGestures {
    pending: VecDeque<Option<HandGesture>>,
}

impl ScriptedGestures {
    pub fn new(script: Vec<Option<HandGesture>>) -> Self {
        Self {
            pending: script.into(),
        }
    }
}

impl GestureRecognizer for ScriptedGestures {
    fn recognize(&mut self, _frame: &RawFrame) -> Result<Option<HandGesture>> {
        Ok(self.pending.pop_front().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn right(gesture: GestureKind, score: f32) -> Option<HandGesture> {
        Some(HandGesture {
            hand: Hand::Right,
            gesture,
            score,
        })
    }

    #[test]
    fn palm_starts_and_fist_stops() {
        let mut ctl = GestureController::new(Hand::Right, 0.5, Duration::from_secs(1));
        assert_eq!(
            ctl.interpret(right(GestureKind::OpenPalm, 0.9), at(0)),
            Some(ControlSignal::Start)
        );
        assert_eq!(
            ctl.interpret(right(GestureKind::ClosedFist, 0.9), at(1500)),
            Some(ControlSignal::Stop)
        );
    }

    #[test]
    fn ignores_wrong_hand_and_weak_scores() {
        let mut ctl = GestureController::new(Hand::Right, 0.5, Duration::ZERO);
        let left = Some(HandGesture {
            hand: Hand::Left,
            gesture: GestureKind::OpenPalm,
            score: 0.99,
        });
        assert_eq!(ctl.interpret(left, at(0)), None);
        assert_eq!(ctl.interpret(right(GestureKind::OpenPalm, 0.5), at(0)), None);
        assert_eq!(ctl.interpret(right(GestureKind::Other, 0.9), at(0)), None);
        assert_eq!(ctl.interpret(None, at(0)), None);
    }

    #[test]
    fn from_settings_uses_configured_hand() {
        let settings = GestureSettings {
            enabled: true,
            cooldown_seconds: f64::NAN,
            min_confidence: 0.7,
            hand: Hand::Left,
        };
        let mut ctl = GestureController::from_settings(&settings);
        assert_eq!(ctl.cooldown, Duration::from_secs(1));
        assert_eq!(ctl.interpret(right(GestureKind::OpenPalm, 0.9), at(0)), None);
    }

    #[test]
    fn cooldown_suppresses_rapid_signals() {
        let mut ctl = GestureController::new(Hand::Right, 0.5, Duration::from_secs(1));
        assert!(ctl.interpret(right(GestureKind::OpenPalm, 0.9), at(0)).is_some());
        assert!(ctl.interpret(right(GestureKind::ClosedFist, 0.9), at(400)).is_none());
        assert!(ctl.interpret(right(GestureKind::ClosedFist, 0.9), at(1000)).is_some());
    }
}
