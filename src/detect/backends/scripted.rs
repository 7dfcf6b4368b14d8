use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionFrame;
use crate::frame::RawFrame;

/// One line of a detection log: detections for a frame plus its capture time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub frame: DetectionFrame,
}

/// Read a JSON-lines detection log. Blank lines are skipped.
pub fn read_detection_log(path: &Path) -> Result<Vec<DetectionRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open detection log {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read {} line {}", path.display(), idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DetectionRecord = serde_json::from_str(&line)
            .map_err(|e| anyhow!("invalid detection record at line {}: {}", idx + 1, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Backend that replays a fixed sequence of detection frames.
///
/// Frames are handed out in order regardless of pixel content. Once the script
/// is exhausted the backend either loops or keeps returning empty frames.
pub struct ScriptedBackend {
    script: Vec<DetectionFrame>,
    pending: VecDeque<DetectionFrame>,
    looping: bool,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<DetectionFrame>) -> Self {
        Self {
            pending: script.iter().cloned().collect(),
            script,
            looping: false,
            calls: 0,
        }
    }

    /// Restart from the first frame after the last one.
    pub fn looping(mut self, enabled: bool) -> Self {
        self.looping = enabled;
        self
    }

    /// Load the frames of a detection log, ignoring timestamps.
    pub fn from_log(path: &Path) -> Result<Self> {
        let records = read_detection_log(path)?;
        Ok(Self::new(records.into_iter().map(|r| r.frame).collect()))
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &RawFrame) -> Result<DetectionFrame> {
        self.calls += 1;
        if self.pending.is_empty() && self.looping {
            self.pending.extend(self.script.iter().cloned());
        }
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use std::io::Write;

    fn person_frame() -> DetectionFrame {
        DetectionFrame::new(
            vec![Detection::person(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9)],
            vec![],
        )
    }

    #[test]
    fn replays_script_then_returns_empty() -> Result<()> {
        let mut backend = ScriptedBackend::new(vec![person_frame()]);
        let frame = RawFrame::filled(1, 1, [0, 0, 0], Utc::now())?;

        assert_eq!(backend.detect(&frame)?.persons.len(), 1);
        assert!(backend.detect(&frame)?.is_empty());
        assert_eq!(backend.calls(), 2);
        Ok(())
    }

    #[test]
    fn looping_script_restarts() -> Result<()> {
        let mut backend =
            ScriptedBackend::new(vec![person_frame(), DetectionFrame::empty()]).looping(true);
        let frame = RawFrame::filled(1, 1, [0, 0, 0], Utc::now())?;

        assert!(!backend.detect(&frame)?.is_empty());
        assert!(backend.detect(&frame)?.is_empty());
        assert!(!backend.detect(&frame)?.is_empty());
        Ok(())
    }

    #[test]
    fn reads_json_lines_log() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            r#"{{"timestamp":"2024-06-01T12:00:00Z","persons":[{{"bbox":{{"x1":0,"y1":0,"x2":10,"y2":10}},"confidence":0.9,"class":"person"}}],"phones":[]}}"#
        )?;
        writeln!(file)?;
        writeln!(file, r#"{{"timestamp":"2024-06-01T12:00:01Z"}}"#)?;

        let records = read_detection_log(file.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].frame.persons.len(), 1);
        assert!(records[1].frame.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_malformed_line() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "not json")?;
        let err = read_detection_log(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
        Ok(())
    }
}
