use crate::commands::camera::settings_view_model;
use crate::viewmodel::SettingsState;
use tauri::command;

#[command]
pub async fn get_settings() -> Result<SettingsState, String> {
    Ok(settings_view_model().await?.state())
}

#[command]
pub async fn set_remember_camera_mode(remember: bool) -> Result<SettingsState, String> {
    let settings = settings_view_model().await?;
    tokio::task::spawn_blocking(move || {
        settings
            .set_remember_camera_mode(remember)
            .map(|_| settings.state())
            .map_err(|e| format!("Failed to save setting: {}", e))
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

#[command]
pub async fn set_remember_aspect_ratio(remember: bool) -> Result<SettingsState, String> {
    let settings = settings_view_model().await?;
    tokio::task::spawn_blocking(move || {
        settings
            .set_remember_aspect_ratio(remember)
            .map(|_| settings.state())
            .map_err(|e| format!("Failed to save setting: {}", e))
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}
