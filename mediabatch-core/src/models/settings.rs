use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub schema_version: u32,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub encode: EncodeSettings,
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_worklist")]
    pub worklist: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default)]
    pub mode: DownloadMode,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_max_audio_bitrate")]
    pub max_audio_bitrate: u32,
    /// Container to convert fetched video streams to. `None` keeps what the source offers.
    #[serde(default)]
    pub video_format: Option<String>,
    /// Codec to extract fetched audio streams to. `None` keeps what the source offers.
    #[serde(default)]
    pub audio_format: Option<String>,
    #[serde(default = "default_result_format")]
    pub result_format: String,
    #[serde(default = "default_true")]
    pub create_playlist_folder: bool,
    #[serde(default = "default_true")]
    pub number_playlist_entries: bool,
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default = "default_true")]
    pub remove_unfinished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Encoder thread count, `None` lets the encoder decide.
    #[serde(default)]
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_true")]
    pub concurrent_fetch: bool,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub abort_on_timeout: bool,
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,
    #[serde(default)]
    pub extra_ytdlp_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Video,
    Audio,
    #[default]
    Both,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown mode '{}', expected video, audio or both", other)),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_worklist() -> PathBuf {
    PathBuf::from("./urls.txt")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_max_height() -> u32 {
    720
}

fn default_max_audio_bitrate() -> u32 {
    192
}

fn default_result_format() -> String {
    "mp4".into()
}

fn default_codec() -> String {
    "libx264".into()
}

fn default_audio_codec() -> String {
    "aac".into()
}

fn default_preset() -> String {
    "medium".into()
}

fn default_fetch_timeout_secs() -> u64 {
    600
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            worklist: default_worklist(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            mode: DownloadMode::default(),
            max_height: default_max_height(),
            max_audio_bitrate: default_max_audio_bitrate(),
            video_format: None,
            audio_format: None,
            result_format: default_result_format(),
            create_playlist_folder: true,
            number_playlist_entries: true,
            skip_existing: true,
            remove_unfinished: true,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            audio_codec: default_audio_codec(),
            preset: default_preset(),
            threads: None,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            concurrent_fetch: true,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            abort_on_timeout: false,
            cookies_file: None,
            extra_ytdlp_flags: Vec::new(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            paths: PathSettings::default(),
            download: DownloadSettings::default(),
            encode: EncodeSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}
