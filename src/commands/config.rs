use crate::config::CamerakConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<CamerakConfig>> = Arc::new(RwLock::new(CamerakConfig::load_or_default()));
}

/// Snapshot used when the camera app is initialized
pub(crate) fn current_config() -> CamerakConfig {
    match GLOBAL_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<CamerakConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Update configuration. Takes effect the next time the camera app is initialized.
#[command]
pub async fn update_config(new_config: CamerakConfig) -> Result<(), String> {
    new_config.validate()?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    new_config
        .save_to_file(CamerakConfig::default_path())
        .map_err(|e| e.to_string())?;

    log::info!("Configuration updated");
    Ok(())
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<CamerakConfig, String> {
    let default_config = CamerakConfig::default();

    {
        let mut config = GLOBAL_CONFIG
            .write()
            .map_err(|e| format!("Failed to write config: {}", e))?;
        *config = default_config.clone();
    }

    default_config
        .save_to_file(CamerakConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(default_config)
}
