use crate::commands::config::current_config;
use crate::gallery::FsMediaIndex;
use crate::platform::DesktopCameraService;
use crate::preferences::PreferencesRepository;
use crate::recording::default_recorder;
use crate::types::{AspectRatio, CameraUiState, CaptureMode, DisplayRotation, MediaItem, PreviewFrame};
use crate::viewmodel::{CameraDeps, CameraViewModel, SettingsViewModel};
use std::sync::Arc;
use tauri::command;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub(crate) struct CameraApp {
    pub camera: CameraViewModel,
    pub settings: SettingsViewModel,
    event_loop: Option<JoinHandle<()>>,
}

// View-models are cheap handles; commands clone them out and release the lock
lazy_static::lazy_static! {
    static ref CAMERA_APP: Arc<RwLock<Option<CameraApp>>> = Arc::new(RwLock::new(None));
}

async fn camera_view_model() -> Result<CameraViewModel, String> {
    let app = CAMERA_APP.read().await;
    app.as_ref()
        .map(|app| app.camera.clone())
        .ok_or_else(|| "Camera app not initialized".to_string())
}

pub(crate) async fn settings_view_model() -> Result<SettingsViewModel, String> {
    let app = CAMERA_APP.read().await;
    app.as_ref()
        .map(|app| app.settings.clone())
        .ok_or_else(|| "Camera app not initialized".to_string())
}

/// Run `f` on the blocking pool; camera calls open devices, join stream
/// threads and finalize recordings
async fn with_camera<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&CameraViewModel) -> T + Send + 'static,
{
    let vm = camera_view_model().await?;
    tokio::task::spawn_blocking(move || f(&vm))
        .await
        .map_err(|e| format!("Task join error: {}", e))
}

fn build_app() -> CameraApp {
    let config = current_config();

    let preferences = match PreferencesRepository::open(config.preferences_dir()) {
        Ok(prefs) => prefs,
        Err(e) => {
            log::warn!("Failed to load preferences, using defaults: {}", e);
            PreferencesRepository::in_memory()
        }
    };
    let preferences = Arc::new(preferences);

    let deps = CameraDeps {
        service: Arc::new(DesktopCameraService::new().with_jpeg_quality(config.capture.jpeg_quality)),
        media_index: Arc::new(FsMediaIndex::from_config(&config)),
        recorder: default_recorder(),
        preferences: Arc::clone(&preferences),
        config,
    };

    CameraApp {
        camera: CameraViewModel::new(deps),
        settings: SettingsViewModel::new(preferences),
        event_loop: None,
    }
}

/// Create the view-models; replaces any previous instance
#[command]
pub async fn initialize_camera_app() -> Result<CameraUiState, String> {
    let mut app = tokio::task::spawn_blocking(build_app)
        .await
        .map_err(|e| format!("Task join error: {}", e))?;
    app.event_loop = app.camera.spawn_event_loop();
    let state = app.camera.state();

    let previous = CAMERA_APP.write().await.replace(app);
    if let Some(previous) = previous {
        if let Some(handle) = previous.event_loop {
            handle.abort();
        }
        let camera = previous.camera;
        tokio::task::spawn_blocking(move || camera.shutdown())
            .await
            .map_err(|e| format!("Task join error: {}", e))?;
    }

    log::info!("Camera app initialized");
    Ok(state)
}

#[command]
pub async fn get_camera_state() -> Result<CameraUiState, String> {
    with_camera(|vm| vm.state()).await
}

#[command]
pub async fn on_preview_surface_available(width: u32, height: u32) -> Result<CameraUiState, String> {
    with_camera(move |vm| {
        vm.on_preview_surface_available(width, height);
        vm.state()
    })
    .await
}

#[command]
pub async fn set_camera_mode(mode: String) -> Result<CameraUiState, String> {
    let mode: CaptureMode = mode.parse().map_err(|e: crate::errors::CameraError| e.to_string())?;
    with_camera(move |vm| {
        vm.set_camera_mode(mode);
        vm.state()
    })
    .await
}

#[command]
pub async fn set_aspect_ratio(ratio: String) -> Result<CameraUiState, String> {
    let ratio: AspectRatio = ratio.parse().map_err(|e: crate::errors::CameraError| e.to_string())?;
    with_camera(move |vm| {
        vm.set_aspect_ratio(ratio);
        vm.state()
    })
    .await
}

#[command]
pub async fn cycle_aspect_ratio() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.cycle_aspect_ratio();
        vm.state()
    })
    .await
}

#[command]
pub async fn toggle_ratio_selector() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.toggle_ratio_selector();
        vm.state()
    })
    .await
}

#[command]
pub async fn collapse_ratio_selector() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.collapse_ratio_selector();
        vm.state()
    })
    .await
}

#[command]
pub async fn switch_camera() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.switch_camera();
        vm.state()
    })
    .await
}

#[command]
pub async fn switch_to_camera_with_flash() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.switch_to_camera_with_flash();
        vm.state()
    })
    .await
}

#[command]
pub async fn toggle_flash() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.toggle_flash();
        vm.state()
    })
    .await
}

/// Shutter button; `display_rotation` is the display rotation in degrees
#[command]
pub async fn capture_action(display_rotation: Option<u32>) -> Result<CameraUiState, String> {
    let rotation = DisplayRotation::from_degrees(display_rotation.unwrap_or(0));
    with_camera(move |vm| {
        vm.capture_action(rotation);
        vm.state()
    })
    .await
}

#[command]
pub async fn on_app_backgrounded() -> Result<(), String> {
    with_camera(|vm| vm.on_app_backgrounded()).await
}

#[command]
pub async fn on_app_foregrounded() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.on_app_foregrounded();
        vm.state()
    })
    .await
}

#[command]
pub async fn refresh_gallery_thumbnails() -> Result<CameraUiState, String> {
    with_camera(|vm| {
        vm.refresh_gallery_thumbnails();
        vm.state()
    })
    .await
}

/// Newest photo or video, if any is still readable
#[command]
pub async fn get_latest_media() -> Result<Option<MediaItem>, String> {
    with_camera(|vm| vm.latest_media()).await
}

/// Row-major 3x3 matrix mapping the camera buffer onto the preview view
#[command]
pub async fn get_preview_transform(
    view_width: u32,
    view_height: u32,
    display_rotation: Option<u32>,
) -> Result<[f64; 9], String> {
    let rotation = DisplayRotation::from_degrees(display_rotation.unwrap_or(0));
    with_camera(move |vm| vm.preview_transform(view_width, view_height, rotation).values()).await
}

/// Newest live preview frame as JPEG; `None` when nothing new arrived
#[command]
pub async fn get_preview_frame() -> Result<Option<PreviewFrame>, String> {
    with_camera(|vm| vm.preview_frame()).await
}
