use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: String,
    pub webpage_url: String,
    pub media_type: MediaType,
    pub duration_seconds: Option<f64>,
    /// 1-based position inside the parent playlist, when the extractor reports one.
    pub playlist_index: Option<u32>,
    /// Playlist entries in source order. `None` marks a removed or private item.
    pub entries: Vec<Option<MediaInfo>>,
    pub streams: Vec<StreamDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Playlist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    /// Average audio bitrate in kbps.
    pub abr: Option<f64>,
    /// Total bitrate in kbps.
    pub tbr: Option<f64>,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl MediaInfo {
    pub fn is_playlist(&self) -> bool {
        self.media_type == MediaType::Playlist
    }

    pub fn video_only_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| s.has_video && !s.has_audio)
    }

    pub fn audio_only_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| s.has_audio && !s.has_video)
    }
}
