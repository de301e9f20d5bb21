use serde::Serialize;
use std::path::PathBuf;

use crate::models::media::StreamKind;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum UnitEvent {
    Skipped {
        title: String,
        path: PathBuf,
    },
    FetchStarted {
        title: String,
        stream: StreamKind,
    },
    FetchProgress {
        title: String,
        stream: StreamKind,
        percent: f64,
    },
    FetchFinished {
        title: String,
        stream: StreamKind,
    },
    MergeStarted {
        title: String,
        path: PathBuf,
    },
    MergeFinished {
        title: String,
        path: PathBuf,
    },
    UnfinishedRemoved {
        title: String,
        path: PathBuf,
    },
    ScratchCleaned {
        title: String,
        removed: usize,
    },
}

pub trait EventEmitter: Send + Sync + 'static {
    fn emit(&self, event: &UnitEvent);
}
