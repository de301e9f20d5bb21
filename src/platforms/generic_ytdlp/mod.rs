use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{mpsc, OnceCell};

use crate::core::ytdlp;
use crate::models::media::{MediaInfo, MediaType, StreamDescriptor, StreamKind};
use crate::platforms::traits::{Extractor, FetchRequest};

pub struct YtdlpExtractor {
    ytdlp_path: OnceCell<PathBuf>,
    extra_flags: Vec<String>,
}

impl YtdlpExtractor {
    pub fn new(cookies_file: Option<PathBuf>, extra_flags: Vec<String>) -> Self {
        let mut flags = Vec::new();
        if let Some(cookies) = cookies_file {
            flags.push("--cookies".to_string());
            flags.push(cookies.to_string_lossy().to_string());
        }
        flags.extend(extra_flags);

        Self {
            ytdlp_path: OnceCell::new(),
            extra_flags: flags,
        }
    }

    async fn ytdlp(&self) -> anyhow::Result<&PathBuf> {
        self.ytdlp_path
            .get_or_try_init(|| async {
                ytdlp::ensure_ytdlp()
                    .await
                    .map_err(|e| anyhow!("yt-dlp unavailable: {}", e))
            })
            .await
    }

    fn parse_streams(json: &serde_json::Value) -> Vec<StreamDescriptor> {
        let formats = match json.get("formats").and_then(|v| v.as_array()) {
            Some(f) => f,
            None => return Vec::new(),
        };

        formats
            .iter()
            .filter_map(|f| {
                let format_id = f.get("format_id").and_then(|v| v.as_str())?.to_string();
                let ext = f.get("ext").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let height = f.get("height").and_then(|v| v.as_u64()).map(|v| v as u32);
                let abr = f.get("abr").and_then(|v| v.as_f64());
                let tbr = f.get("tbr").and_then(|v| v.as_f64());
                let vcodec = f.get("vcodec").and_then(|v| v.as_str());
                let acodec = f.get("acodec").and_then(|v| v.as_str());

                Some(StreamDescriptor {
                    format_id,
                    ext,
                    height,
                    abr,
                    tbr,
                    has_video: vcodec.map(|v| v != "none").unwrap_or(false),
                    has_audio: acodec.map(|a| a != "none").unwrap_or(false),
                })
            })
            .collect()
    }

    pub fn parse_media_info(json: &serde_json::Value) -> anyhow::Result<MediaInfo> {
        let is_live = json.get("is_live").and_then(|v| v.as_bool()).unwrap_or(false);
        if is_live {
            return Err(anyhow!("Livestreams not supported"));
        }

        let media_type = match json.get("_type").and_then(|v| v.as_str()) {
            Some("playlist") | Some("multi_video") => MediaType::Playlist,
            _ => MediaType::Video,
        };

        let title = json
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let webpage_url = json
            .get("webpage_url")
            .or_else(|| json.get("original_url"))
            .or_else(|| json.get("url"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let entries = if media_type == MediaType::Playlist {
            json.get("entries")
                .and_then(|v| v.as_array())
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| {
                            if entry.is_null() {
                                return None;
                            }
                            match Self::parse_media_info(entry) {
                                Ok(info) => Some(info),
                                Err(e) => {
                                    tracing::warn!("Unusable playlist entry in \"{}\": {}", title, e);
                                    None
                                }
                            }
                        })
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(MediaInfo {
            id: json.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()),
            title,
            webpage_url,
            media_type,
            duration_seconds: json.get("duration").and_then(|v| v.as_f64()),
            playlist_index: json
                .get("playlist_index")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
            entries,
            streams: Self::parse_streams(json),
        })
    }

    fn postprocess_args(request: &FetchRequest) -> Vec<String> {
        let Some(target) = request.convert_to.as_deref() else {
            return Vec::new();
        };

        match request.kind {
            StreamKind::Video => vec!["--recode-video".to_string(), target.to_string()],
            StreamKind::Audio => vec![
                "-x".to_string(),
                "--audio-format".to_string(),
                target.to_string(),
                "--audio-quality".to_string(),
                format!("{}K", request.audio_bitrate),
            ],
        }
    }
}

#[async_trait]
impl Extractor for YtdlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(&self, locator: &str) -> anyhow::Result<MediaInfo> {
        let ytdlp_path = self.ytdlp().await?;
        let json = ytdlp::dump_info(ytdlp_path, locator, &self.extra_flags).await?;
        let mut info = Self::parse_media_info(&json)?;
        if info.webpage_url.is_empty() {
            info.webpage_url = locator.to_string();
        }
        Ok(info)
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f64>,
    ) -> anyhow::Result<()> {
        let _ = progress.send(0.0).await;

        let ytdlp_path = self.ytdlp().await?;
        tokio::fs::create_dir_all(&request.dir).await?;

        let job = ytdlp::StreamDownload {
            url: &request.locator,
            format: request.selector.as_str(),
            output_template: ytdlp::output_template(&request.dir, &request.stem),
            postprocess: Self::postprocess_args(request),
            extra_flags: &self.extra_flags,
        };

        ytdlp::download_stream(ytdlp_path, job, progress, request.cancel_token.clone()).await
    }
}
