use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::collection::Collection;
use crate::core::error::BatchError;
use crate::core::scratch;
use crate::core::unit::{MediaUnit, Services, UnitOutcome};
use crate::core::worklist;
use crate::models::settings::AppSettings;

#[derive(Debug)]
pub struct FailedItem {
    pub title: String,
    pub error: BatchError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedItem>,
    /// Set when a timeout stopped the run early.
    pub aborted: bool,
}

impl BatchReport {
    /// Records one unit's result. Returns true if it timed out.
    pub fn record(&mut self, title: &str, result: Result<UnitOutcome, BatchError>) -> bool {
        match result {
            Ok(UnitOutcome::Completed(path)) => {
                self.completed.push(path);
                false
            }
            Ok(UnitOutcome::Skipped(path)) => {
                self.skipped.push(path);
                false
            }
            Err(error) => {
                tracing::error!(title = %title, "{}", error_chain(&error));
                let timed_out = error.is_timeout();
                self.failed.push(FailedItem {
                    title: title.to_string(),
                    error,
                });
                timed_out
            }
        }
    }

    pub fn absorb(&mut self, other: BatchReport) {
        self.completed.extend(other.completed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.aborted |= other.aborted;
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    pub fn log_summary(&self) {
        if self.is_clean() {
            tracing::info!(
                "Done: {} completed, {} skipped",
                self.completed.len(),
                self.skipped.len()
            );
            return;
        }

        tracing::warn!(
            "Done{}: {} completed, {} skipped, {} failed",
            if self.aborted { " (stopped early)" } else { "" },
            self.completed.len(),
            self.skipped.len(),
            self.failed.len()
        );
        for item in &self.failed {
            tracing::warn!("  {}: {}", item.title, error_chain(&item.error));
        }
    }
}

/// Renders an error and its sources on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

pub enum Target {
    Single(MediaUnit),
    Playlist(Collection),
}

impl Target {
    pub fn title(&self) -> &str {
        match self {
            Self::Single(unit) => unit.title(),
            Self::Playlist(collection) => collection.title(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        match self {
            Self::Single(unit) => unit.output_dir(),
            Self::Playlist(collection) => collection.output_dir(),
        }
    }

    async fn run(&self, abort_on_timeout: bool) -> BatchReport {
        match self {
            Self::Single(unit) => {
                let mut report = BatchReport::default();
                let timed_out = report.record(unit.title(), unit.run().await);
                report.aborted = timed_out && abort_on_timeout;
                report
            }
            Self::Playlist(collection) => collection.run().await,
        }
    }

    async fn exit(&self) {
        match self {
            Self::Single(unit) => unit.exit().await,
            Self::Playlist(collection) => collection.exit().await,
        }
    }
}

/// Drives a worklist: resolves every target up front, then runs them one at
/// a time with the scratch directory emptied before each.
pub struct Coordinator {
    settings: Arc<AppSettings>,
    services: Services,
    targets: Vec<Target>,
    current: Mutex<Option<usize>>,
}

impl Coordinator {
    pub async fn new(settings: Arc<AppSettings>, services: Services) -> Result<Self, BatchError> {
        Self::validate(&settings)?;

        let scratch_dir = &settings.paths.scratch_dir;
        if !scratch_dir.exists() {
            tracing::warn!("Scratch directory {} does not exist, creating it", scratch_dir.display());
            tokio::fs::create_dir_all(scratch_dir).await?;
        }

        match &settings.advanced.cookies_file {
            None => tracing::warn!("No cookies file configured; age-restricted or private media may fail"),
            Some(path) if !path.exists() => {
                tracing::warn!("Cookies file {} does not exist", path.display())
            }
            Some(_) => {}
        }

        Ok(Self {
            settings,
            services,
            targets: Vec::new(),
            current: Mutex::new(None),
        })
    }

    pub fn validate(settings: &AppSettings) -> Result<(), BatchError> {
        let output_dir = &settings.paths.output_dir;
        if !output_dir.is_dir() {
            return Err(BatchError::Configuration(format!(
                "output directory {} does not exist",
                output_dir.display()
            )));
        }

        if settings.advanced.fetch_timeout_secs == 0 {
            return Err(BatchError::Configuration(
                "advanced.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }

        if !settings.paths.worklist.is_file() {
            return Err(BatchError::WorklistNotFound(settings.paths.worklist.clone()));
        }

        Ok(())
    }

    pub async fn load_worklist(&self) -> Result<Vec<String>, BatchError> {
        worklist::load_worklist(&self.settings.paths.worklist).await
    }

    /// Resolves every locator before anything is fetched. Locators that fail
    /// to resolve, or whose playlist folder cannot be made, are returned as
    /// failures and left out of the run.
    pub async fn classify_all(&mut self) -> Result<Vec<FailedItem>, BatchError> {
        let locators = self.load_worklist().await?;
        let mut unresolved = Vec::new();

        for locator in locators {
            let info = match MediaUnit::classify(self.services.extractor.as_ref(), &locator).await {
                Ok(info) => info,
                Err(error) => {
                    tracing::error!("{}", error_chain(&error));
                    unresolved.push(FailedItem {
                        title: locator,
                        error,
                    });
                    continue;
                }
            };

            let target = if info.is_playlist() {
                match Collection::build(info, self.settings.clone(), self.services.clone()).await {
                    Ok(collection) => Target::Playlist(collection),
                    Err(error) => {
                        tracing::error!("{}: {}", locator, error_chain(&error));
                        unresolved.push(FailedItem {
                            title: locator,
                            error,
                        });
                        continue;
                    }
                }
            } else {
                Target::Single(MediaUnit::new(
                    info,
                    self.settings.paths.output_dir.clone(),
                    "",
                    self.settings.clone(),
                    self.services.clone(),
                ))
            };
            self.targets.push(target);
        }

        tracing::info!(
            "{} targets ready, {} could not be resolved",
            self.targets.len(),
            unresolved.len()
        );
        Ok(unresolved)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub async fn clear_scratch(&self) -> Result<usize, BatchError> {
        Ok(scratch::clear_dir(&self.settings.paths.scratch_dir).await?)
    }

    pub async fn run(&self) -> BatchReport {
        let mut report = BatchReport::default();
        let total = self.targets.len();

        for (index, target) in self.targets.iter().enumerate() {
            if let Err(error) = self.clear_scratch().await {
                report.record(target.title(), Err(error));
                continue;
            }

            *self.current.lock().unwrap() = Some(index);
            tracing::info!("Target {}/{}: {}", index + 1, total, target.title());

            report.absorb(target.run(self.settings.advanced.abort_on_timeout).await);
            if report.aborted {
                tracing::warn!("Stopping the batch after a timeout");
                break;
            }
        }

        *self.current.lock().unwrap() = None;
        report
    }

    pub async fn exit(&self) {
        let current = *self.current.lock().unwrap();
        let target = current.and_then(|i| self.targets.get(i));
        if let Some(target) = target {
            tracing::info!("Stopping \"{}\"", target.title());
            target.exit().await;
        }

        if let Err(e) = self.clear_scratch().await {
            tracing::warn!("Could not clear scratch directory: {}", e);
        }

        let output_dir = target
            .map(|t| t.output_dir())
            .unwrap_or(self.settings.paths.output_dir.as_path());
        let removed = scratch::remove_stray_byproducts(output_dir).await;
        if removed > 0 {
            tracing::info!("Removed {} unfinished files from {}", removed, output_dir.display());
        }
    }
}
