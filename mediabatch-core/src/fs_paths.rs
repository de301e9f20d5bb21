use std::path::PathBuf;

const DATA_DIR_ENV: &str = "MEDIABATCH_DATA_DIR";

pub trait AppPaths: Send + Sync {
    fn data_dir(&self) -> PathBuf;
    fn bin_dir(&self) -> PathBuf;
    fn settings_file(&self) -> PathBuf;
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::data_dir()
            .map(|d| d.join("mediabatch"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn bin_dir(&self) -> PathBuf {
        self.data_dir().join("bin")
    }

    fn settings_file(&self) -> PathBuf {
        self.data_dir().join("settings.json")
    }
}
