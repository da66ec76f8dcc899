//! View-models
//!
//! [`CameraViewModel`] turns user actions into session, recorder and gallery
//! calls and publishes [`crate::types::CameraUiState`] snapshots.
//! [`SettingsViewModel`] exposes the two remembered-setting toggles.

pub mod camera;
pub mod settings;

pub use camera::{CameraDeps, CameraViewModel};
pub use settings::{SettingsState, SettingsViewModel};
