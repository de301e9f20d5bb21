use std::path::{Path, PathBuf};

use mediabatch_core::fs_paths::{AppPaths, DesktopPaths};

use crate::core::error::BatchError;
use crate::models::settings::AppSettings;

pub fn default_settings_path() -> PathBuf {
    DesktopPaths.settings_file()
}

/// Loads settings from `path`, or from the default location when `None`.
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings, BatchError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_settings_path(), false),
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(AppSettings::default());
        }
        Err(e) => {
            return Err(BatchError::Configuration(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_str::<AppSettings>(&contents).map_err(|e| {
        BatchError::Configuration(format!("invalid settings in {}: {}", path.display(), e))
    })
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}
