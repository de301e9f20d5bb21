use std::path::PathBuf;

use clap::Parser;

use crate::models::settings::{AppSettings, DownloadMode};

#[derive(Parser, Debug, Default)]
#[command(name = "mediabatch")]
#[command(about = "Fetch video and audio streams for every URL in a worklist and mux them together")]
pub struct Args {
    /// Worklist file, one URL per line
    pub worklist: Option<PathBuf>,

    /// Settings file (defaults to settings.json in the data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scratch directory for streams waiting to be merged
    #[arg(long)]
    pub scratch: Option<PathBuf>,

    /// What to fetch: video, audio or both
    #[arg(short, long)]
    pub mode: Option<DownloadMode>,

    /// Highest video height to fetch
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Highest audio bitrate to fetch, in kbps
    #[arg(long)]
    pub max_abr: Option<u32>,

    /// Convert fetched video to this container
    #[arg(long)]
    pub video_format: Option<String>,

    /// Convert fetched audio to this codec
    #[arg(long)]
    pub audio_format: Option<String>,

    /// Container of merged output
    #[arg(long)]
    pub result_format: Option<String>,

    /// Video codec for muxing, `copy` to skip re-encoding or `auto` to probe for a GPU encoder
    #[arg(long)]
    pub codec: Option<String>,

    /// Encoder preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Encoder threads
    #[arg(long)]
    pub threads: Option<u32>,

    /// Fetch video and audio one after the other
    #[arg(long)]
    pub no_concurrent_fetch: bool,

    /// Seconds to wait for both streams when fetching concurrently
    #[arg(long)]
    pub fetch_timeout: Option<u64>,

    /// Stop the whole batch when a fetch times out
    #[arg(long)]
    pub abort_on_timeout: bool,

    /// Cookies file passed to yt-dlp
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Fetch again even when the output already exists
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Keep a partially merged output when interrupted
    #[arg(long)]
    pub keep_unfinished: bool,

    /// Put playlist items directly in the output root
    #[arg(long)]
    pub no_playlist_folder: bool,

    /// Do not prefix playlist items with their position
    #[arg(long)]
    pub no_numbering: bool,

    /// Save the effective settings to the settings file and exit
    #[arg(long)]
    pub write_config: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Overrides `settings` with every flag given on the command line.
    pub fn apply(&self, settings: &mut AppSettings) {
        let paths = &mut settings.paths;
        if let Some(worklist) = &self.worklist {
            paths.worklist = worklist.clone();
        }
        if let Some(output) = &self.output {
            paths.output_dir = output.clone();
        }
        if let Some(scratch) = &self.scratch {
            paths.scratch_dir = scratch.clone();
        }

        let download = &mut settings.download;
        if let Some(mode) = self.mode {
            download.mode = mode;
        }
        if let Some(h) = self.max_height {
            download.max_height = h;
        }
        if let Some(abr) = self.max_abr {
            download.max_audio_bitrate = abr;
        }
        if self.video_format.is_some() {
            download.video_format = self.video_format.clone();
        }
        if self.audio_format.is_some() {
            download.audio_format = self.audio_format.clone();
        }
        if let Some(fmt) = &self.result_format {
            download.result_format = fmt.clone();
        }
        if self.no_skip_existing {
            download.skip_existing = false;
        }
        if self.keep_unfinished {
            download.remove_unfinished = false;
        }
        if self.no_playlist_folder {
            download.create_playlist_folder = false;
        }
        if self.no_numbering {
            download.number_playlist_entries = false;
        }

        let encode = &mut settings.encode;
        if let Some(codec) = &self.codec {
            encode.codec = codec.clone();
        }
        if let Some(preset) = &self.preset {
            encode.preset = preset.clone();
        }
        if self.threads.is_some() {
            encode.threads = self.threads;
        }

        let advanced = &mut settings.advanced;
        if self.no_concurrent_fetch {
            advanced.concurrent_fetch = false;
        }
        if let Some(secs) = self.fetch_timeout {
            advanced.fetch_timeout_secs = secs;
        }
        if self.abort_on_timeout {
            advanced.abort_on_timeout = true;
        }
        if self.cookies.is_some() {
            advanced.cookies_file = self.cookies.clone();
        }
    }
}
