use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::media::StreamKind;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("worklist {} does not exist", .0.display())]
    WorklistNotFound(PathBuf),

    #[error("could not resolve {locator}")]
    Resolution {
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stream} fetch failed for \"{title}\"")]
    Fetch {
        title: String,
        stream: StreamKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stream} scratch file for \"{title}\" not found after fetching")]
    Merge { title: String, stream: StreamKind },

    #[error("muxing \"{title}\" failed")]
    Mux {
        title: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "fetching \"{title}\" timed out after {}s (video finished: {video_done}, audio finished: {audio_done})",
        .timeout.as_secs()
    )]
    Timeout {
        title: String,
        timeout: Duration,
        video_done: bool,
        audio_done: bool,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Errors that stop the run before any target is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::WorklistNotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
