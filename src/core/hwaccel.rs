use std::process::Stdio;

use tokio::sync::OnceCell;

use crate::core::process;

#[derive(Debug, Clone, Default)]
pub struct HwAccelInfo {
    pub encoders: Vec<String>,
    pub recommended_video_encoder: Option<String>,
}

static HW_ACCEL_CACHE: OnceCell<HwAccelInfo> = OnceCell::const_new();

const GPU_ENCODER_PRIORITY: &[&str] = &[
    "h264_nvenc",
    "h264_qsv",
    "h264_amf",
    "h264_videotoolbox",
    "h264_vaapi",
];

const GPU_KEYWORDS: &[&str] = &["nvenc", "qsv", "amf", "videotoolbox", "vaapi"];

pub async fn detect_hwaccel() -> HwAccelInfo {
    HW_ACCEL_CACHE
        .get_or_init(|| async { detect_hwaccel_inner().await })
        .await
        .clone()
}

async fn detect_hwaccel_inner() -> HwAccelInfo {
    let output = process::command("ffmpeg")
        .args(["-encoders", "-hide_banner"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    let encoders = match output {
        Ok(o) => parse_gpu_encoders(&String::from_utf8_lossy(&o.stdout)),
        Err(e) => {
            tracing::debug!("ffmpeg -encoders failed: {}", e);
            Vec::new()
        }
    };

    let recommended_video_encoder = recommend(&encoders);
    HwAccelInfo {
        encoders,
        recommended_video_encoder,
    }
}

fn recommend(encoders: &[String]) -> Option<String> {
    GPU_ENCODER_PRIORITY
        .iter()
        .find(|c| encoders.iter().any(|e| e == *c))
        .map(|s| s.to_string())
}

fn parse_gpu_encoders(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let codec_name = *parts.get(1)?;
            GPU_KEYWORDS
                .iter()
                .any(|kw| codec_name.contains(kw))
                .then(|| codec_name.to_string())
        })
        .collect()
}
