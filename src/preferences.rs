//! User preferences
//!
//! A [`PreferenceNamespace`] is a small string-keyed store persisted as one
//! JSON file per namespace. [`PreferencesRepository`] layers the camera's
//! typed settings on top of the `camera_prefs` namespace and publishes the
//! two toggles through watch channels.

use crate::errors::CameraError;
use crate::types::{AspectRatio, CaptureMode};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

pub const NAMESPACE: &str = "camera_prefs";

pub const KEY_REMEMBER_CAMERA_MODE: &str = "remember_camera_mode";
pub const KEY_REMEMBER_ASPECT_RATIO: &str = "remember_aspect_ratio";
pub const KEY_LAST_CAMERA_MODE: &str = "last_camera_mode";
pub const KEY_LAST_ASPECT_RATIO: &str = "last_aspect_ratio";

/// String-keyed preference store
pub struct PreferenceNamespace {
    name: String,
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl PreferenceNamespace {
    /// Load `<dir>/<name>.json`; a missing file starts empty
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, CameraError> {
        let path = dir.as_ref().join(format!("{}.json", name));
        let values = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| {
                CameraError::PreferencesError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    log::warn!("Preferences file {} is corrupt, starting empty", path.display());
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        log::debug!("Opened preferences {} ({} keys)", name, values.len());
        Ok(Self {
            name: name.to_string(),
            path: Some(path),
            values: Mutex::new(values),
        })
    }

    /// Store that never touches disk
    pub fn in_memory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            values: Mutex::new(Map::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lock().get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.lock().get(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn put_bool(&self, key: &str, value: bool) -> Result<(), CameraError> {
        self.put(key, Value::Bool(value))
    }

    pub fn put_string(&self, key: &str, value: &str) -> Result<(), CameraError> {
        self.put(key, Value::String(value.to_string()))
    }

    pub fn remove(&self, key: &str) -> Result<(), CameraError> {
        let mut values = self.lock();
        values.remove(key);
        self.persist(&values)
    }

    fn put(&self, key: &str, value: Value) -> Result<(), CameraError> {
        let mut values = self.lock();
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    /// Write through a temp file so a crash never leaves half a file behind
    fn persist(&self, values: &Map<String, Value>) -> Result<(), CameraError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::PreferencesError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(values)
            .map_err(|e| CameraError::PreferencesError(format!("Failed to serialize preferences: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| CameraError::PreferencesError(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// Typed access to the camera's preferences
pub struct PreferencesRepository {
    store: PreferenceNamespace,
    remember_camera_mode: watch::Sender<bool>,
    remember_aspect_ratio: watch::Sender<bool>,
}

impl PreferencesRepository {
    pub fn new(store: PreferenceNamespace) -> Self {
        let (remember_camera_mode, _) = watch::channel(store.get_bool(KEY_REMEMBER_CAMERA_MODE, true));
        let (remember_aspect_ratio, _) = watch::channel(store.get_bool(KEY_REMEMBER_ASPECT_RATIO, true));
        Self {
            store,
            remember_camera_mode,
            remember_aspect_ratio,
        }
    }

    /// Open the `camera_prefs` namespace under `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        Ok(Self::new(PreferenceNamespace::open(dir, NAMESPACE)?))
    }

    pub fn in_memory() -> Self {
        Self::new(PreferenceNamespace::in_memory(NAMESPACE))
    }

    pub fn remember_camera_mode(&self) -> bool {
        *self.remember_camera_mode.borrow()
    }

    pub fn remember_aspect_ratio(&self) -> bool {
        *self.remember_aspect_ratio.borrow()
    }

    pub fn subscribe_remember_camera_mode(&self) -> watch::Receiver<bool> {
        self.remember_camera_mode.subscribe()
    }

    pub fn subscribe_remember_aspect_ratio(&self) -> watch::Receiver<bool> {
        self.remember_aspect_ratio.subscribe()
    }

    /// The in-memory value changes even when persisting fails
    pub fn set_remember_camera_mode(&self, remember: bool) -> Result<(), CameraError> {
        self.remember_camera_mode.send_replace(remember);
        self.store.put_bool(KEY_REMEMBER_CAMERA_MODE, remember)
    }

    pub fn set_remember_aspect_ratio(&self, remember: bool) -> Result<(), CameraError> {
        self.remember_aspect_ratio.send_replace(remember);
        self.store.put_bool(KEY_REMEMBER_ASPECT_RATIO, remember)
    }

    /// Stored mode; unknown values read as absent
    pub fn last_camera_mode(&self) -> Option<CaptureMode> {
        self.store.get_string(KEY_LAST_CAMERA_MODE)?.parse().ok()
    }

    pub fn set_last_camera_mode(&self, mode: CaptureMode) -> Result<(), CameraError> {
        self.store.put_string(KEY_LAST_CAMERA_MODE, mode.as_str())
    }

    pub fn last_aspect_ratio(&self) -> Option<AspectRatio> {
        self.store.get_string(KEY_LAST_ASPECT_RATIO)?.parse().ok()
    }

    pub fn set_last_aspect_ratio(&self, ratio: AspectRatio) -> Result<(), CameraError> {
        self.store.put_string(KEY_LAST_ASPECT_RATIO, ratio.as_str())
    }

    pub fn namespace(&self) -> &PreferenceNamespace {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = PreferencesRepository::in_memory();
        assert!(prefs.remember_camera_mode());
        assert!(prefs.remember_aspect_ratio());
        assert_eq!(prefs.last_camera_mode(), None);
        assert_eq!(prefs.last_aspect_ratio(), None);
    }

    #[test]
    fn test_unknown_stored_value_reads_as_absent() {
        let prefs = PreferencesRepository::in_memory();
        prefs.namespace().put_string(KEY_LAST_ASPECT_RATIO, "RATIO_3_2").unwrap();
        assert_eq!(prefs.last_aspect_ratio(), None);
    }

    #[test]
    fn test_watch_receivers_see_updates() {
        let prefs = PreferencesRepository::in_memory();
        let rx = prefs.subscribe_remember_aspect_ratio();
        prefs.set_remember_aspect_ratio(false).unwrap();
        assert!(!*rx.borrow());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("camera_prefs.json"), "not json").unwrap();
        let store = PreferenceNamespace::open(dir.path(), NAMESPACE).unwrap();
        assert!(store.get_bool(KEY_REMEMBER_CAMERA_MODE, true));
    }
}
