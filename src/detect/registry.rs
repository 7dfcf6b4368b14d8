use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::DetectionSettings;
use crate::detect::backends::ScriptedBackend;
use crate::detect::result::DetectionFrame;
use crate::frame::RawFrame;

use super::backend::DetectorBackend;

/// YOLOv8 export input size.
#[cfg(feature = "backend-tract")]
const MODEL_INPUT_SIZE: u32 = 640;

/// Thread-safe registry of detector backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Build a registry holding the backend named in `settings`.
    pub fn from_settings(settings: &DetectionSettings) -> Result<Self> {
        let mut registry = Self::new();
        match settings.backend.as_str() {
            "scripted" => {
                let backend = match &settings.script_path {
                    Some(path) => ScriptedBackend::from_log(path)?,
                    None => {
                        log::warn!("scripted backend has no script_path; every frame will be empty");
                        ScriptedBackend::default()
                    }
                };
                registry.register(backend);
            }
            #[cfg(feature = "backend-tract")]
            "tract" => {
                let model_path = settings
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("tract backend requires detection.model_path"))?;
                let backend = super::backends::TractBackend::new(
                    model_path,
                    MODEL_INPUT_SIZE,
                    MODEL_INPUT_SIZE,
                )?
                .with_threshold(settings.confidence_threshold)
                .with_iou_threshold(settings.iou_threshold);
                registry.register(backend);
            }
            #[cfg(not(feature = "backend-tract"))]
            "tract" => {
                return Err(anyhow!("tract backend requires the backend-tract feature"));
            }
            other => return Err(anyhow!("unknown detector backend '{}'", other)),
        }
        Ok(registry)
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Warm up every registered backend.
    pub fn warm_up_all(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Run detection with the default backend.
    pub fn detect(&self, frame: &RawFrame) -> Result<DetectionFrame> {
        let backend = self
            .default_backend()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(frame)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use chrono::Utc;

    #[test]
    fn first_registered_backend_is_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::new(vec![DetectionFrame::new(
            vec![Detection::person(BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.9)],
            vec![],
        )]));
        assert_eq!(registry.default_name(), Some("scripted"));
        assert_eq!(registry.list(), vec!["scripted".to_string()]);

        let frame = RawFrame::filled(2, 2, [0, 0, 0], Utc::now())?;
        let detections = registry.detect(&frame)?;
        assert_eq!(detections.persons.len(), 1);
        Ok(())
    }

    #[test]
    fn set_default_rejects_unknown_backend() {
        let mut registry = BackendRegistry::new();
        assert!(registry.set_default("tract").is_err());
    }

    #[test]
    fn detect_without_backend_fails() -> Result<()> {
        let registry = BackendRegistry::new();
        let frame = RawFrame::filled(1, 1, [0, 0, 0], Utc::now())?;
        assert!(registry.detect(&frame).is_err());
        Ok(())
    }

    fn settings(backend: &str) -> DetectionSettings {
        DetectionSettings {
            backend: backend.to_string(),
            model_path: None,
            script_path: None,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            frame_skip: 1,
        }
    }

    #[test]
    fn from_settings_builds_named_backend() -> Result<()> {
        let registry = BackendRegistry::from_settings(&settings("scripted"))?;
        assert_eq!(registry.default_name(), Some("scripted"));
        assert!(BackendRegistry::from_settings(&settings("yolo9000")).is_err());
        assert!(BackendRegistry::from_settings(&settings("tract")).is_err());
        Ok(())
    }
}
