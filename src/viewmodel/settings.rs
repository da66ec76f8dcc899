//! Settings screen view-model

use crate::errors::CameraError;
use crate::preferences::PreferencesRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Toggles shown on the settings screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsState {
    pub remember_camera_mode: bool,
    pub remember_aspect_ratio: bool,
}

#[derive(Clone)]
pub struct SettingsViewModel {
    preferences: Arc<PreferencesRepository>,
}

impl SettingsViewModel {
    pub fn new(preferences: Arc<PreferencesRepository>) -> Self {
        Self { preferences }
    }

    pub fn state(&self) -> SettingsState {
        SettingsState {
            remember_camera_mode: self.preferences.remember_camera_mode(),
            remember_aspect_ratio: self.preferences.remember_aspect_ratio(),
        }
    }

    pub fn remember_camera_mode(&self) -> watch::Receiver<bool> {
        self.preferences.subscribe_remember_camera_mode()
    }

    pub fn remember_aspect_ratio(&self) -> watch::Receiver<bool> {
        self.preferences.subscribe_remember_aspect_ratio()
    }

    pub fn set_remember_camera_mode(&self, remember: bool) -> Result<(), CameraError> {
        log::info!("Remember camera mode: {}", remember);
        self.preferences.set_remember_camera_mode(remember)
    }

    pub fn set_remember_aspect_ratio(&self, remember: bool) -> Result<(), CameraError> {
        log::info!("Remember aspect ratio: {}", remember);
        self.preferences.set_remember_aspect_ratio(remember)
    }
}
