use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use mediabatch_core::core::events::{EventEmitter, UnitEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::unit::Services;
use crate::models::media::{MediaInfo, MediaType, StreamKind};
use crate::models::settings::AppSettings;
use crate::platforms::traits::{EncodeOptions, Extractor, FetchRequest, Muxer};

pub const STRAY_FILE: &str = "stray.bin";

pub fn video_info(title: &str, url: &str) -> MediaInfo {
    MediaInfo {
        id: None,
        title: title.to_string(),
        webpage_url: url.to_string(),
        media_type: MediaType::Video,
        duration_seconds: Some(10.0),
        playlist_index: None,
        entries: Vec::new(),
        streams: Vec::new(),
    }
}

pub fn playlist_info(title: &str, url: &str, entries: Vec<Option<MediaInfo>>) -> MediaInfo {
    MediaInfo {
        media_type: MediaType::Playlist,
        entries,
        ..video_info(title, url)
    }
}

/// Settings rooted in `root`, with the output and scratch directories created.
pub fn test_settings(root: &Path) -> AppSettings {
    let mut settings = AppSettings::default();
    settings.paths.output_dir = root.join("downloads");
    settings.paths.scratch_dir = root.join("cache");
    settings.paths.worklist = root.join("urls.txt");
    std::fs::create_dir_all(&settings.paths.output_dir).unwrap();
    std::fs::create_dir_all(&settings.paths.scratch_dir).unwrap();
    settings
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

pub fn services(
    extractor: Arc<FakeExtractor>,
    muxer: Arc<FakeMuxer>,
) -> (Services, Arc<RecordingEmitter>) {
    let events = Arc::new(RecordingEmitter::default());
    let services = Services {
        extractor,
        muxer,
        events: events.clone(),
    };
    (services, events)
}

fn stream_ext(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Video => "mp4",
        StreamKind::Audio => "m4a",
    }
}

#[derive(Default)]
pub struct FakeExtractor {
    infos: HashMap<String, MediaInfo>,
    delays: HashMap<StreamKind, Duration>,
    failing: HashSet<StreamKind>,
    failing_locators: HashSet<String>,
    empty: HashSet<StreamKind>,
    hanging: HashSet<StreamKind>,
    stray_after_fetch: bool,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetched: Mutex<Vec<(String, StreamKind)>>,
    /// Names present in the fetch directory when each fetch started.
    snapshots: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, info: MediaInfo) -> Self {
        self.infos.insert(info.webpage_url.clone(), info);
        self
    }

    pub fn with_delay(mut self, kind: StreamKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn failing(mut self, kind: StreamKind) -> Self {
        self.failing.insert(kind);
        self
    }

    pub fn failing_locator(mut self, locator: &str) -> Self {
        self.failing_locators.insert(locator.to_string());
        self
    }

    /// Fetches of `kind` succeed without writing a file.
    pub fn producing_nothing(mut self, kind: StreamKind) -> Self {
        self.empty.insert(kind);
        self
    }

    /// Fetches of `kind` only return once cancelled.
    pub fn hanging(mut self, kind: StreamKind) -> Self {
        self.hanging.insert(kind);
        self
    }

    pub fn leaving_stray_files(mut self) -> Self {
        self.stray_after_fetch = true;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<(String, StreamKind)> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn snapshots(&self) -> Vec<(String, Vec<String>)> {
        self.snapshots.lock().unwrap().clone()
    }

    async fn wait(cancel: &CancellationToken, delay: Duration) -> anyhow::Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(anyhow!("Download cancelled")),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn resolve(&self, locator: &str) -> anyhow::Result<MediaInfo> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.infos
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("Unsupported URL: {}", locator))
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f64>,
    ) -> anyhow::Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched
            .lock()
            .unwrap()
            .push((request.locator.clone(), request.kind));
        self.snapshots
            .lock()
            .unwrap()
            .push((request.locator.clone(), file_names(&request.dir)));

        let _ = progress.send(0.0).await;

        let delay = self.delays.get(&request.kind).copied().unwrap_or_default();
        Self::wait(&request.cancel_token, delay).await?;

        if self.hanging.contains(&request.kind) {
            request.cancel_token.cancelled().await;
            bail!("Download cancelled");
        }
        if self.failing.contains(&request.kind) || self.failing_locators.contains(&request.locator) {
            bail!("HTTP Error 403: Forbidden");
        }

        let _ = progress.send(100.0).await;
        if self.empty.contains(&request.kind) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&request.dir).await?;
        let path = request
            .dir
            .join(format!("{}.{}", request.stem, stream_ext(request.kind)));
        let body = format!(
            "{}:{}:{}",
            request.kind,
            request.locator,
            request.selector.as_str()
        );
        tokio::fs::write(&path, body).await?;

        if self.stray_after_fetch {
            tokio::fs::write(request.dir.join(STRAY_FILE), b"stray").await?;
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMuxer {
    hang: bool,
    fail: bool,
    combine_calls: AtomicUsize,
}

impl FakeMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a partial output, then waits for cancellation.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Writes a partial output, then fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn combine_calls(&self) -> usize {
        self.combine_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn combine(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        _opts: &EncodeOptions,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<()> {
        self.combine_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang || self.fail {
            tokio::fs::write(output, b"partial").await?;
            if self.hang {
                cancel_token.cancelled().await;
                bail!("Mux cancelled");
            }
            bail!("Invalid data found when processing input");
        }

        let mut body = tokio::fs::read(video).await?;
        body.push(b'|');
        body.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, body).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<UnitEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<UnitEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&UnitEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(*e)).count()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: &UnitEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn output_path(settings: &AppSettings, stem: &str) -> PathBuf {
    settings
        .paths
        .output_dir
        .join(format!("{}.{}", stem, settings.download.result_format))
}
