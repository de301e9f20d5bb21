use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::selector::StreamSelector;
use crate::models::media::{MediaInfo, StreamKind};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub locator: String,
    pub kind: StreamKind,
    pub selector: StreamSelector,
    /// Directory the stream is written into.
    pub dir: PathBuf,
    /// File name without extension; the extractor appends the stream's own.
    pub stem: String,
    /// Container or codec to convert the fetched stream to.
    pub convert_to: Option<String>,
    /// Bitrate ceiling used when audio is re-encoded, in kbps.
    pub audio_bitrate: u32,
    pub cancel_token: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub codec: String,
    pub audio_codec: String,
    pub preset: Option<String>,
    pub threads: Option<u32>,
}

/// Resolves locators and fetches single streams to disk.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    async fn resolve(&self, locator: &str) -> anyhow::Result<MediaInfo>;
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: tokio::sync::mpsc::Sender<f64>,
    ) -> anyhow::Result<()>;
}

/// Combines a video file and an audio file into one container.
#[async_trait]
pub trait Muxer: Send + Sync {
    fn name(&self) -> &str;
    async fn combine(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        opts: &EncodeOptions,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<()>;
}
