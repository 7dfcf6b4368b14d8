use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gesture::Hand;
use crate::tracker::TrackerConfig;

const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_FRAME_SKIP: u32 = 3;
const DEFAULT_TEMPORAL_FRAMES: usize = 5;
const DEFAULT_COOLDOWN_SECS: f64 = 10.0;
const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_RETENTION_DAYS: u32 = 30;
const DEFAULT_DB_PATH: &str = "data/phone_shamer.db";
const DEFAULT_SCREENSHOTS_PATH: &str = "data/screenshots";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "phone_shamer.log";
const DEFAULT_GESTURE_COOLDOWN_SECS: f64 = 1.0;
const DEFAULT_GESTURE_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct ShamerConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    proximity: Option<ProximityConfigFile>,
    screenshot: Option<ScreenshotConfigFile>,
    storage: Option<StorageConfigFile>,
    logging: Option<LoggingConfigFile>,
    gesture: Option<GestureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps_target: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    frame_skip: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ProximityConfigFile {
    temporal_consistency_frames: Option<usize>,
    cooldown_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ScreenshotConfigFile {
    save_enabled: Option<bool>,
    quality: Option<u8>,
    include_annotations: Option<bool>,
    retention_days: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    database_path: Option<String>,
    screenshots_base_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingConfigFile {
    level: Option<String>,
    file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct GestureConfigFile {
    enabled: Option<bool>,
    cooldown_seconds: Option<f64>,
    min_confidence: Option<f32>,
    hand: Option<Hand>,
}

#[derive(Debug, Clone)]
pub struct ShamerConfig {
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub proximity: ProximitySettings,
    pub screenshot: ScreenshotSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub gesture: GestureSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device node, or a `stub://` URL for the synthetic source.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps_target: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    /// Detection log replayed by the scripted backend.
    pub script_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Process every Nth captured frame.
    pub frame_skip: u32,
}

#[derive(Debug, Clone)]
pub struct ProximitySettings {
    pub temporal_consistency_frames: usize,
    pub cooldown_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct ScreenshotSettings {
    pub save_enabled: bool,
    pub quality: u8,
    pub include_annotations: bool,
    pub retention_days: u32,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub database_path: String,
    pub screenshots_base_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct GestureSettings {
    pub enabled: bool,
    pub cooldown_seconds: f64,
    pub min_confidence: f32,
    pub hand: Hand,
}

impl ShamerConfig {
    /// Load from `PHONE_SHAMER_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PHONE_SHAMER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::finish(file_cfg.unwrap_or_default())
    }

    /// Load an explicit config file, then apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::finish(read_config_file(path)?)
    }

    fn finish(file: ShamerConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ShamerConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let proximity = file.proximity.unwrap_or_default();
        let screenshot = file.screenshot.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let logging = file.logging.unwrap_or_default();
        let gesture = file.gesture.unwrap_or_default();

        Self {
            camera: CameraSettings {
                device: camera
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                fps_target: camera.fps_target.unwrap_or(DEFAULT_CAMERA_FPS),
            },
            detection: DetectionSettings {
                backend: detection
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detection.model_path,
                script_path: detection.script_path,
                confidence_threshold: detection
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE),
                iou_threshold: detection.iou_threshold.unwrap_or(DEFAULT_IOU),
                frame_skip: detection.frame_skip.unwrap_or(DEFAULT_FRAME_SKIP),
            },
            proximity: ProximitySettings {
                temporal_consistency_frames: proximity
                    .temporal_consistency_frames
                    .unwrap_or(DEFAULT_TEMPORAL_FRAMES),
                cooldown_seconds: proximity.cooldown_seconds.unwrap_or(DEFAULT_COOLDOWN_SECS),
            },
            screenshot: ScreenshotSettings {
                save_enabled: screenshot.save_enabled.unwrap_or(true),
                quality: screenshot.quality.unwrap_or(DEFAULT_JPEG_QUALITY),
                include_annotations: screenshot.include_annotations.unwrap_or(true),
                retention_days: screenshot.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            },
            storage: StorageSettings {
                database_path: storage
                    .database_path
                    .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                screenshots_base_path: storage
                    .screenshots_base_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SCREENSHOTS_PATH)),
            },
            logging: LoggingSettings {
                level: logging
                    .level
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                file: match logging.file {
                    Some(path) if path.as_os_str().is_empty() => None,
                    Some(path) => Some(path),
                    None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
                },
            },
            gesture: GestureSettings {
                enabled: gesture.enabled.unwrap_or(false),
                cooldown_seconds: gesture
                    .cooldown_seconds
                    .unwrap_or(DEFAULT_GESTURE_COOLDOWN_SECS),
                min_confidence: gesture.min_confidence.unwrap_or(DEFAULT_GESTURE_CONFIDENCE),
                hand: gesture.hand.unwrap_or(Hand::Right),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PHONE_SHAMER_DB_PATH") {
            if !path.trim().is_empty() {
                self.storage.database_path = path;
            }
        }
        if let Ok(device) = std::env::var("PHONE_SHAMER_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(level) = std::env::var("PHONE_SHAMER_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(frames) = std::env::var("PHONE_SHAMER_TEMPORAL_FRAMES") {
            self.proximity.temporal_consistency_frames = frames.trim().parse().map_err(|_| {
                anyhow!("PHONE_SHAMER_TEMPORAL_FRAMES must be a positive integer")
            })?;
        }
        if let Ok(cooldown) = std::env::var("PHONE_SHAMER_COOLDOWN_SECS") {
            self.proximity.cooldown_seconds = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("PHONE_SHAMER_COOLDOWN_SECS must be a number of seconds"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.proximity.temporal_consistency_frames == 0 {
            return Err(anyhow!("temporal_consistency_frames must be >= 1"));
        }
        validate_seconds("cooldown_seconds", self.proximity.cooldown_seconds)?;
        validate_seconds("gesture.cooldown_seconds", self.gesture.cooldown_seconds)?;
        if self.detection.frame_skip == 0 {
            return Err(anyhow!("frame_skip must be >= 1"));
        }
        validate_unit("confidence_threshold", self.detection.confidence_threshold)?;
        validate_unit("iou_threshold", self.detection.iou_threshold)?;
        validate_unit("gesture.min_confidence", self.gesture.min_confidence)?;
        if !(1..=100).contains(&self.screenshot.quality) {
            return Err(anyhow!("screenshot quality must be within 1..=100"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.storage.database_path.trim().is_empty() {
            return Err(anyhow!("database_path must not be empty"));
        }
        Ok(())
    }

    /// Tracker settings. A cooldown `validate` would reject falls back to the default.
    pub fn tracker_config(&self) -> TrackerConfig {
        let cooldown = Duration::try_from_secs_f64(self.proximity.cooldown_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_COOLDOWN_SECS));
        TrackerConfig::new(self.proximity.temporal_consistency_frames, cooldown)
    }
}

impl GestureSettings {
    /// Falls back to the default for values `validate` would reject.
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_GESTURE_COOLDOWN_SECS))
    }
}

fn validate_seconds(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{} must be a finite number >= 0", name));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{} is too large: {}", name, value))?;
    Ok(())
}

fn validate_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1]", name));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<ShamerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() -> Result<()> {
        let cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.validate()?;
        assert_eq!(cfg.proximity.temporal_consistency_frames, 5);
        assert_eq!(cfg.proximity.cooldown_seconds, 10.0);
        assert_eq!(cfg.detection.frame_skip, 3);
        assert_eq!(cfg.camera.device, "/dev/video0");
        assert!(!cfg.gesture.enabled);
        assert_eq!(cfg.tracker_config(), TrackerConfig::default());
        Ok(())
    }

    #[test]
    fn rejects_zero_window_and_negative_cooldown() {
        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.proximity.temporal_consistency_frames = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.proximity.cooldown_seconds = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.proximity.cooldown_seconds = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_cooldowns_too_large_for_duration() {
        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.proximity.cooldown_seconds = 1e20;
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.tracker_config().cooldown, Duration::from_secs(10));

        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.gesture.cooldown_seconds = 1e20;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_log_file_disables_file_logging() -> Result<()> {
        let file: ShamerConfigFile = toml::from_str(
            r#"
            [logging]
            file = ""
            "#,
        )?;
        assert_eq!(ShamerConfig::from_file(file).logging.file, None);

        let cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        assert_eq!(cfg.logging.file, Some(PathBuf::from("phone_shamer.log")));
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let mut cfg = ShamerConfig::from_file(ShamerConfigFile::default());
        cfg.screenshot.quality = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_toml_sections() -> Result<()> {
        let file: ShamerConfigFile = toml::from_str(
            r#"
            [proximity]
            temporal_consistency_frames = 3
            cooldown_seconds = 2.5

            [gesture]
            enabled = true
            hand = "left"
            "#,
        )?;
        let cfg = ShamerConfig::from_file(file);
        assert_eq!(cfg.proximity.temporal_consistency_frames, 3);
        assert_eq!(cfg.tracker_config().cooldown, Duration::from_millis(2500));
        assert!(cfg.gesture.enabled);
        assert_eq!(cfg.gesture.hand, Hand::Left);
        Ok(())
    }
}
