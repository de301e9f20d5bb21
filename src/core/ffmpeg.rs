use std::path::Path;
use std::process::Stdio;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::core::{hwaccel, process, ytdlp};
use crate::platforms::traits::{EncodeOptions, Muxer};

const FALLBACK_VIDEO_CODEC: &str = "libx264";

pub async fn is_ffmpeg_available() -> bool {
    process::command("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn mux_args(video: &Path, audio: &Path, output: &Path, opts: &EncodeOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        opts.codec.clone(),
    ];

    if opts.codec != "copy" {
        if let Some(preset) = &opts.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }
    }

    if let Some(threads) = opts.threads {
        args.extend(["-threads".to_string(), threads.to_string()]);
    }

    args.extend([
        "-c:a".to_string(),
        opts.audio_codec.clone(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

pub async fn mux_video_audio(
    video: &Path,
    audio: &Path,
    output: &Path,
    opts: &EncodeOptions,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut child = process::command("ffmpeg")
        .args(mux_args(video, audio, output, opts))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to run ffmpeg: {}", e))?;

    let stderr = child.stderr.take().ok_or_else(|| anyhow!("ffmpeg has no stderr"))?;
    let stderr_reader = tokio::spawn(ytdlp::read_tail(stderr));

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| anyhow!("ffmpeg process failed: {}", e))?,
        _ = cancel_token.cancelled() => {
            let _ = child.kill().await;
            stderr_reader.abort();
            return Err(anyhow!("Mux cancelled"));
        }
    };

    let stderr_tail = stderr_reader.await.unwrap_or_default();
    if !status.success() {
        return Err(anyhow!("ffmpeg exited with {}: {}", status, stderr_tail.trim()));
    }

    Ok(())
}

/// Muxer backed by the `ffmpeg` binary. A codec of `auto` resolves once to the
/// best hardware H.264 encoder, or libx264 when there is none.
pub struct FfmpegMuxer {
    resolved_auto: OnceCell<String>,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self {
            resolved_auto: OnceCell::new(),
        }
    }

    async fn resolve_codec(&self, codec: &str) -> String {
        if codec != "auto" {
            return codec.to_string();
        }

        self.resolved_auto
            .get_or_init(|| async {
                let info = hwaccel::detect_hwaccel().await;
                tracing::debug!("GPU encoders: {:?}", info.encoders);
                let codec = info
                    .recommended_video_encoder
                    .unwrap_or_else(|| FALLBACK_VIDEO_CODEC.to_string());
                tracing::info!("Resolved codec 'auto' to {}", codec);
                codec
            })
            .await
            .clone()
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn combine(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        opts: &EncodeOptions,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<()> {
        let opts = EncodeOptions {
            codec: self.resolve_codec(&opts.codec).await,
            ..opts.clone()
        };
        mux_video_audio(video, audio, output, &opts, cancel_token).await
    }
}
