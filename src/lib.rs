//! camerak: camera session, capture post-processing and gallery core for
//! Tauri camera applications
//!
//! The crate drives a camera through a session state machine
//! (open, configure, preview, capture, record, close), post-processes stills
//! (rotation, aspect-ratio crop, EXIF normalization), keeps track of the
//! newest gallery items and remembers the user's mode and aspect ratio.
//!
//! Hardware access sits behind [`platform::CameraService`]; the desktop
//! backend uses nokhwa and the [`testing`] module provides a scripted one.
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! camerak = { version = "0.3", features = ["recording"] }
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(camerak::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod commands;
pub mod config;
pub mod errors;
pub mod gallery;
pub mod platform;
pub mod preferences;
pub mod processing;
pub mod recording;
pub mod session;
pub mod types;
pub mod viewmodel;

// Testing utilities - simulated backends and synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::CamerakConfig;
pub use errors::CameraError;
pub use gallery::{FsMediaIndex, GalleryState, MediaIndex};
pub use platform::{CameraService, DesktopCameraService, SessionEvent, SessionEventKind};
pub use preferences::PreferencesRepository;
pub use processing::{process_still, ProcessedStill, StillProcessingParams};
pub use recording::{MediaRecorder, RecordingSettings};
pub use session::{SessionController, SessionState};
pub use types::{
    AspectRatio, CameraUiState, CaptureMode, DisplayRotation, LensFacing, MediaItem, MediaKind, PreviewFrame, Size,
};
pub use viewmodel::{CameraDeps, CameraViewModel, SettingsViewModel};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the camerak plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("camerak")
        .invoke_handler(tauri::generate_handler![
            // Camera screen commands
            commands::camera::initialize_camera_app,
            commands::camera::get_camera_state,
            commands::camera::on_preview_surface_available,
            commands::camera::set_camera_mode,
            commands::camera::set_aspect_ratio,
            commands::camera::cycle_aspect_ratio,
            commands::camera::toggle_ratio_selector,
            commands::camera::collapse_ratio_selector,
            commands::camera::switch_camera,
            commands::camera::switch_to_camera_with_flash,
            commands::camera::toggle_flash,
            commands::camera::capture_action,
            commands::camera::on_app_backgrounded,
            commands::camera::on_app_foregrounded,
            commands::camera::refresh_gallery_thumbnails,
            commands::camera::get_latest_media,
            commands::camera::get_preview_transform,
            commands::camera::get_preview_frame,
            // Settings screen commands
            commands::settings::get_settings,
            commands::settings::set_remember_camera_mode,
            commands::settings::set_remember_aspect_ratio,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
        ])
        .build()
}

/// Initialize logging for the camera app
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camerak=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
