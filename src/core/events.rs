use std::time::{Duration, Instant};

use mediabatch_core::core::events::{EventEmitter, UnitEvent};

/// Logs unit lifecycle events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingEmitter;

impl EventEmitter for TracingEmitter {
    fn emit(&self, event: &UnitEvent) {
        match event {
            UnitEvent::Skipped { title, path } => {
                tracing::info!(title = %title, "Skipping, {} already exists", path.display());
            }
            UnitEvent::FetchStarted { title, stream } => {
                tracing::info!(title = %title, "Fetching {} stream", stream);
            }
            UnitEvent::FetchProgress {
                title,
                stream,
                percent,
            } => {
                tracing::debug!(title = %title, "{} stream at {:.1}%", stream, percent);
            }
            UnitEvent::FetchFinished { title, stream } => {
                tracing::info!(title = %title, "Finished {} stream", stream);
            }
            UnitEvent::MergeStarted { title, path } => {
                tracing::info!(title = %title, "Merging into {}", path.display());
            }
            UnitEvent::MergeFinished { title, path } => {
                tracing::info!(title = %title, "Wrote {}", path.display());
            }
            UnitEvent::UnfinishedRemoved { title, path } => {
                tracing::warn!(title = %title, "Removed unfinished output {}", path.display());
            }
            UnitEvent::ScratchCleaned { title, removed } => {
                tracing::debug!(title = %title, "Removed {} scratch files", removed);
            }
        }
    }
}

pub struct ProgressThrottle {
    last_emit: Instant,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_emit: Instant::now() - Duration::from_secs(10),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    pub fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_emit) >= self.min_interval {
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}
