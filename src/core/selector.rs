use std::cmp::Ordering;

use crate::models::media::{MediaInfo, StreamDescriptor, StreamKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSelector {
    /// A concrete format id picked from resolved metadata.
    Format(String),
    /// A selector expression the extractor evaluates itself.
    Expression(String),
}

impl StreamSelector {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Format(id) => id,
            Self::Expression(expr) => expr,
        }
    }
}

fn by_bitrate(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(0.0).total_cmp(&b.unwrap_or(0.0))
}

fn best_video(info: &MediaInfo, max_height: u32) -> Option<&StreamDescriptor> {
    info.video_only_streams()
        .filter(|s| s.height.map_or(true, |h| h <= max_height))
        .max_by(|a, b| {
            a.height
                .unwrap_or(0)
                .cmp(&b.height.unwrap_or(0))
                .then_with(|| by_bitrate(a.tbr, b.tbr))
        })
}

fn best_audio(info: &MediaInfo, max_bitrate: u32) -> Option<&StreamDescriptor> {
    info.audio_only_streams()
        .filter(|s| s.abr.map_or(true, |abr| abr <= max_bitrate as f64))
        .max_by(|a, b| by_bitrate(a.abr, b.abr).then_with(|| by_bitrate(a.tbr, b.tbr)))
}

/// Picks the best stream of `kind` under `ceiling` (pixels of height for video,
/// kbps for audio), falling back to a selector expression when the metadata
/// carries no qualifying stream.
pub fn select_stream(info: &MediaInfo, kind: StreamKind, ceiling: u32) -> StreamSelector {
    let picked = match kind {
        StreamKind::Video => best_video(info, ceiling),
        StreamKind::Audio => best_audio(info, ceiling),
    };

    match picked {
        Some(stream) => StreamSelector::Format(stream.format_id.clone()),
        None => StreamSelector::Expression(match kind {
            StreamKind::Video => format!("bestvideo[height<=?{}]", ceiling),
            StreamKind::Audio => format!("bestaudio[abr<=?{}]", ceiling),
        }),
    }
}
