//! Configuration management for camerak
//!
//! Loads and saves the TOML file holding camera selection, still-capture,
//! recording and storage settings.

use crate::errors::CameraError;
use crate::recording::RecordingSettings;
use crate::types::Size;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamerakConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
}

/// Camera selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Start on the first camera that has a flash unit
    pub prefer_flash_camera: bool,
    /// Preview size used until the camera reports its own [width, height]
    pub default_preview_size: [u32; 2],
}

/// Still capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// JPEG quality of processed stills (1-100)
    pub jpeg_quality: u8,
    /// File name prefix for photos
    pub photo_prefix: String,
}

/// Video recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// File name prefix for videos
    pub video_prefix: String,
}

/// Media and preference locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory indexed for photos; empty means the user's pictures directory
    pub pictures_dir: String,
    /// Directory indexed for videos; empty means the user's videos directory
    pub movies_dir: String,
    /// Directory holding the preferences namespace file
    pub preferences_dir: String,
}

impl Default for CamerakConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                prefer_flash_camera: true,
                default_preview_size: [1920, 1080],
            },
            capture: CaptureConfig {
                jpeg_quality: 100,
                photo_prefix: "IMG_".to_string(),
            },
            recording: RecordingConfig {
                width: 1920,
                height: 1080,
                fps: 30,
                bitrate: 10_000_000,
                video_prefix: "VID_".to_string(),
            },
            storage: StorageConfig {
                pictures_dir: String::new(),
                movies_dir: String::new(),
                preferences_dir: String::new(),
            },
        }
    }
}

impl CamerakConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::InitializationError(format!("Failed to read config file: {}", e))
        })?;

        let config: CamerakConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::InitializationError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CameraError::InitializationError(format!(
                        "Failed to create config directory: {}",
                        e
                    ))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::InitializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::InitializationError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camerak.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let [w, h] = self.camera.default_preview_size;
        if w == 0 || h == 0 {
            return Err("Invalid default preview size".to_string());
        }

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if self.recording.width == 0 || self.recording.height == 0 {
            return Err("Invalid recording resolution".to_string());
        }
        if self.recording.width % 2 != 0 || self.recording.height % 2 != 0 {
            return Err("Recording resolution must have even width and height".to_string());
        }
        if self.recording.fps == 0 || self.recording.fps > 240 {
            return Err("Invalid recording FPS (must be 1-240)".to_string());
        }
        if self.recording.bitrate < 100_000 {
            return Err("Recording bitrate must be at least 100 kbps".to_string());
        }

        Ok(())
    }

    pub fn default_preview_size(&self) -> Size {
        let [w, h] = self.camera.default_preview_size;
        Size::new(w, h)
    }

    /// Recorder settings derived from the `[recording]` section
    pub fn recording_settings(&self) -> RecordingSettings {
        RecordingSettings {
            size: Size::new(self.recording.width, self.recording.height),
            fps: self.recording.fps,
            bitrate: self.recording.bitrate,
            orientation_hint: 0,
        }
    }

    pub fn pictures_dir(&self) -> PathBuf {
        resolve_dir(&self.storage.pictures_dir, dirs::picture_dir, "Pictures")
    }

    pub fn movies_dir(&self) -> PathBuf {
        resolve_dir(&self.storage.movies_dir, dirs::video_dir, "Movies")
    }

    pub fn preferences_dir(&self) -> PathBuf {
        if !self.storage.preferences_dir.is_empty() {
            return PathBuf::from(&self.storage.preferences_dir);
        }
        dirs::config_dir()
            .map(|dir| dir.join("camerak"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn resolve_dir(configured: &str, platform_default: fn() -> Option<PathBuf>, fallback: &str) -> PathBuf {
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    platform_default().unwrap_or_else(|| PathBuf::from(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CamerakConfig::default();
        assert_eq!(config.camera.default_preview_size, [1920, 1080]);
        assert_eq!(config.recording.bitrate, 10_000_000);
        assert_eq!(config.recording.fps, 30);
        assert_eq!(config.capture.jpeg_quality, 100);
    }

    #[test]
    fn test_config_validation() {
        let config = CamerakConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_preview = config.clone();
        bad_preview.camera.default_preview_size = [0, 0];
        assert!(bad_preview.validate().is_err());

        let mut bad_quality = CamerakConfig::default();
        bad_quality.capture.jpeg_quality = 0;
        assert!(bad_quality.validate().is_err());

        let mut bad_fps = CamerakConfig::default();
        bad_fps.recording.fps = 500;
        assert!(bad_fps.validate().is_err());
    }

    #[test]
    fn test_odd_recording_size_rejected() {
        let mut config = CamerakConfig::default();
        config.recording.width = 1279;
        assert!(config.validate().is_err());

        let mut config = CamerakConfig::default();
        config.recording.height = 719;
        assert!(config.validate().is_err());

        let mut config = CamerakConfig::default();
        config.recording.width = 1280;
        config.recording.height = 720;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("camerak.toml");

        let mut config = CamerakConfig::default();
        config.capture.jpeg_quality = 90;
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = CamerakConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.capture.jpeg_quality, 90);
        assert_eq!(loaded.recording.video_prefix, "VID_");
    }

    #[test]
    fn test_config_toml_format() {
        let config = CamerakConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("prefer_flash_camera"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CamerakConfig::load_from_file("nonexistent_camerak.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().recording.fps, 30);
    }

    #[test]
    fn test_configured_dirs_override_platform_defaults() {
        let mut config = CamerakConfig::default();
        config.storage.pictures_dir = "/tmp/pics".to_string();
        config.storage.preferences_dir = "/tmp/prefs".to_string();
        assert_eq!(config.pictures_dir(), PathBuf::from("/tmp/pics"));
        assert_eq!(config.preferences_dir(), PathBuf::from("/tmp/prefs"));
    }
}
