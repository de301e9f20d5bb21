use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::batch::BatchReport;
use crate::core::error::BatchError;
use crate::core::filename::sanitize_path_component;
use crate::core::unit::{MediaUnit, Services};
use crate::models::media::MediaInfo;
use crate::models::settings::AppSettings;
use crate::platforms::traits::Extractor;

/// A playlist: its units, pre-built in playback order, run one at a time.
pub struct Collection {
    title: String,
    output_dir: PathBuf,
    units: Vec<MediaUnit>,
    current: Mutex<Option<usize>>,
    settings: Arc<AppSettings>,
}

impl Collection {
    pub async fn classify(extractor: &dyn Extractor, locator: &str) -> Result<MediaInfo, BatchError> {
        MediaUnit::classify(extractor, locator).await
    }

    /// Picks the output folder and turns every available entry into a unit.
    /// Entries are numbered by their position in the playlist, so an
    /// unavailable entry still uses up its number.
    pub async fn build(
        info: MediaInfo,
        settings: Arc<AppSettings>,
        services: Services,
    ) -> Result<Self, BatchError> {
        let output_root = &settings.paths.output_dir;
        let output_dir = if settings.download.create_playlist_folder {
            let dir = output_root.join(sanitize_path_component(&info.title));
            if !dir.exists() {
                tokio::fs::create_dir_all(&dir).await?;
                tracing::info!("Created folder {}", dir.display());
            }
            dir
        } else {
            output_root.clone()
        };

        let mut entries: Vec<(u32, MediaInfo)> = Vec::with_capacity(info.entries.len());
        for (position, entry) in info.entries.into_iter().enumerate() {
            let position = position as u32 + 1;
            match entry {
                Some(entry) if !entry.webpage_url.is_empty() => {
                    let ordinal = entry.playlist_index.unwrap_or(position);
                    entries.push((ordinal, entry));
                }
                Some(entry) => {
                    tracing::warn!("Entry {} of \"{}\" ({}) has no URL, skipping", position, info.title, entry.title);
                }
                None => {
                    tracing::warn!("Entry {} of \"{}\" is unavailable, skipping", position, info.title);
                }
            }
        }
        entries.sort_by_key(|(ordinal, _)| *ordinal);

        let numbered = settings.download.number_playlist_entries;
        let units = entries
            .into_iter()
            .map(|(ordinal, entry)| {
                let prefix = if numbered {
                    format!("{} - ", ordinal)
                } else {
                    String::new()
                };
                MediaUnit::new(entry, output_dir.clone(), &prefix, settings.clone(), services.clone())
            })
            .collect::<Vec<_>>();

        tracing::info!("Playlist \"{}\": {} items", info.title, units.len());

        Ok(Self {
            title: info.title,
            output_dir,
            units,
            current: Mutex::new(None),
            settings,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn units(&self) -> &[MediaUnit] {
        &self.units
    }

    pub async fn run(&self) -> BatchReport {
        let mut report = BatchReport::default();
        let total = self.units.len();

        for (index, unit) in self.units.iter().enumerate() {
            *self.current.lock().unwrap() = Some(index);
            tracing::info!("[{}/{}] {}", index + 1, total, unit.title());

            let timed_out = report.record(unit.title(), unit.run().await);
            if timed_out && self.settings.advanced.abort_on_timeout {
                tracing::warn!("Stopping \"{}\" after a timeout", self.title);
                report.aborted = true;
                break;
            }
        }

        *self.current.lock().unwrap() = None;
        report
    }

    pub async fn exit(&self) {
        let current = *self.current.lock().unwrap();
        if let Some(unit) = current.and_then(|i| self.units.get(i)) {
            unit.exit().await;
        }
    }
}
