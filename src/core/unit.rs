use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use mediabatch_core::core::events::{EventEmitter, UnitEvent};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::error::BatchError;
use crate::core::events::ProgressThrottle;
use crate::core::filename::sanitize_path_component;
use crate::core::scratch;
use crate::core::selector::select_stream;
use crate::models::media::{MediaInfo, StreamKind};
use crate::models::settings::{AppSettings, DownloadMode};
use crate::platforms::traits::{EncodeOptions, Extractor, FetchRequest, Muxer};

/// Collaborators shared by every unit of a run.
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn Extractor>,
    pub muxer: Arc<dyn Muxer>,
    pub events: Arc<dyn EventEmitter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed(PathBuf),
    Skipped(PathBuf),
}

#[derive(Debug, Default)]
struct UnitState {
    fetching_video: AtomicBool,
    fetching_audio: AtomicBool,
    merging: AtomicBool,
}

impl UnitState {
    fn fetching(&self, kind: StreamKind) -> &AtomicBool {
        match kind {
            StreamKind::Video => &self.fetching_video,
            StreamKind::Audio => &self.fetching_audio,
        }
    }
}

/// Holds a `fetching-*` flag up for as long as it lives.
struct FetchFlag {
    state: Arc<UnitState>,
    kind: StreamKind,
}

impl FetchFlag {
    fn raise(state: Arc<UnitState>, kind: StreamKind) -> Self {
        state.fetching(kind).store(true, Ordering::SeqCst);
        Self { state, kind }
    }
}

impl Drop for FetchFlag {
    fn drop(&mut self) {
        self.state.fetching(self.kind).store(false, Ordering::SeqCst);
    }
}

struct FetchJob {
    extractor: Arc<dyn Extractor>,
    events: Arc<dyn EventEmitter>,
    state: Arc<UnitState>,
    title: String,
    request: FetchRequest,
}

async fn run_fetch(job: FetchJob) -> Result<(), BatchError> {
    let FetchJob {
        extractor,
        events,
        state,
        title,
        request,
    } = job;
    let kind = request.kind;
    let _flag = FetchFlag::raise(state, kind);

    events.emit(&UnitEvent::FetchStarted {
        title: title.clone(),
        stream: kind,
    });

    let (tx, mut rx) = mpsc::channel::<f64>(32);
    let progress_events = events.clone();
    let progress_title = title.clone();
    let forwarder = tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new(150);
        while let Some(percent) = rx.recv().await {
            if !throttle.should_emit() && percent < 100.0 {
                continue;
            }
            progress_events.emit(&UnitEvent::FetchProgress {
                title: progress_title.clone(),
                stream: kind,
                percent,
            });
        }
    });

    let result = extractor.fetch(&request, tx).await;
    let _ = forwarder.await;

    match result {
        Ok(()) => {
            events.emit(&UnitEvent::FetchFinished { title, stream: kind });
            Ok(())
        }
        Err(source) => {
            tracing::error!(title = %title, "{} fetch failed: {:#}", kind, source);
            Err(BatchError::Fetch {
                title,
                stream: kind,
                source,
            })
        }
    }
}

/// One video: its two streams, the merge that joins them, and the cleanup of
/// everything it wrote along the way.
pub struct MediaUnit {
    info: MediaInfo,
    stem: String,
    output_dir: PathBuf,
    token: String,
    settings: Arc<AppSettings>,
    services: Services,
    state: Arc<UnitState>,
    output: Mutex<Option<PathBuf>>,
    cancel_token: Mutex<CancellationToken>,
}

impl MediaUnit {
    pub async fn classify(extractor: &dyn Extractor, locator: &str) -> Result<MediaInfo, BatchError> {
        tracing::info!("Resolving {} with {}", locator, extractor.name());
        extractor
            .resolve(locator)
            .await
            .map_err(|source| BatchError::Resolution {
                locator: locator.to_string(),
                source,
            })
    }

    /// `prefix` is prepended to the title before sanitizing, e.g. `"3 - "`.
    pub fn new(
        info: MediaInfo,
        output_dir: PathBuf,
        prefix: &str,
        settings: Arc<AppSettings>,
        services: Services,
    ) -> Self {
        let stem = sanitize_path_component(&format!("{}{}", prefix, info.title));
        Self {
            info,
            stem,
            output_dir,
            token: uuid::Uuid::new_v4().simple().to_string(),
            settings,
            services,
            state: Arc::new(UnitState::default()),
            output: Mutex::new(None),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn final_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.stem, self.settings.download.result_format))
    }

    pub fn is_fetching_video(&self) -> bool {
        self.state.fetching_video.load(Ordering::SeqCst)
    }

    pub fn is_fetching_audio(&self) -> bool {
        self.state.fetching_audio.load(Ordering::SeqCst)
    }

    pub fn is_merging(&self) -> bool {
        self.state.merging.load(Ordering::SeqCst)
    }

    fn scratch_dir(&self) -> &Path {
        &self.settings.paths.scratch_dir
    }

    fn marker(&self, kind: StreamKind) -> String {
        scratch::scratch_marker(&kind.to_string(), &self.token)
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel_token.lock().unwrap().clone()
    }

    fn arm_cancel_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel_token.lock().unwrap() = token.clone();
        token
    }

    fn fetch_job(&self, kind: StreamKind, target_dir: &Path) -> FetchJob {
        let download = &self.settings.download;
        let (ceiling, convert_to) = match kind {
            StreamKind::Video => (download.max_height, download.video_format.clone()),
            StreamKind::Audio => (download.max_audio_bitrate, download.audio_format.clone()),
        };

        FetchJob {
            extractor: self.services.extractor.clone(),
            events: self.services.events.clone(),
            state: self.state.clone(),
            title: self.info.title.clone(),
            request: FetchRequest {
                locator: self.info.webpage_url.clone(),
                kind,
                selector: select_stream(&self.info, kind, ceiling),
                dir: target_dir.to_path_buf(),
                stem: format!("{}.{}-{}", self.stem, kind, self.token),
                convert_to,
                audio_bitrate: download.max_audio_bitrate,
                cancel_token: self.current_token(),
            },
        }
    }

    /// Fetches the video stream into `target_dir` under a token-qualified name.
    pub async fn fetch_video(&self, target_dir: &Path) -> Result<(), BatchError> {
        run_fetch(self.fetch_job(StreamKind::Video, target_dir)).await
    }

    /// Fetches the audio stream into `target_dir` under a token-qualified name.
    pub async fn fetch_audio(&self, target_dir: &Path) -> Result<(), BatchError> {
        run_fetch(self.fetch_job(StreamKind::Audio, target_dir)).await
    }

    pub async fn run(&self) -> Result<UnitOutcome, BatchError> {
        self.arm_cancel_token();

        match self.settings.download.mode {
            DownloadMode::Both => {
                let final_path = self.final_path();
                if self.settings.download.skip_existing && final_path.exists() {
                    return Ok(self.skipped(final_path));
                }

                let result = self.run_both().await;
                if result.is_err() {
                    self.remove_own_scratch().await;
                }
                result.map(UnitOutcome::Completed)
            }
            DownloadMode::Video => self.run_single(StreamKind::Video).await,
            DownloadMode::Audio => self.run_single(StreamKind::Audio).await,
        }
    }

    fn skipped(&self, path: PathBuf) -> UnitOutcome {
        self.services.events.emit(&UnitEvent::Skipped {
            title: self.info.title.clone(),
            path: path.clone(),
        });
        UnitOutcome::Skipped(path)
    }

    async fn run_single(&self, kind: StreamKind) -> Result<UnitOutcome, BatchError> {
        if self.settings.download.skip_existing {
            if let Some(existing) = scratch::find_output_file(&self.output_dir, &self.stem).await? {
                return Ok(self.skipped(existing));
            }
        }

        let output_dir = self.output_dir.clone();
        let result = match kind {
            StreamKind::Video => self.fetch_video(&output_dir).await,
            StreamKind::Audio => self.fetch_audio(&output_dir).await,
        };
        if let Err(e) = result {
            scratch::remove_by_marker(&output_dir, &self.marker(kind)).await;
            return Err(e);
        }

        let fetched = scratch::find_by_marker(&output_dir, &self.marker(kind))
            .await?
            .ok_or_else(|| BatchError::Merge {
                title: self.info.title.clone(),
                stream: kind,
            })?;

        let final_path = match fetched.extension() {
            Some(ext) => output_dir.join(format!("{}.{}", self.stem, ext.to_string_lossy())),
            None => output_dir.join(&self.stem),
        };
        tokio::fs::rename(&fetched, &final_path).await?;
        tracing::info!(title = %self.info.title, "Saved {}", final_path.display());

        Ok(UnitOutcome::Completed(final_path))
    }

    async fn run_both(&self) -> Result<PathBuf, BatchError> {
        tokio::fs::create_dir_all(self.scratch_dir()).await?;
        let scratch_dir = self.scratch_dir().to_path_buf();

        if self.settings.advanced.concurrent_fetch {
            self.fetch_concurrently(&scratch_dir).await?;
        } else {
            self.fetch_video(&scratch_dir).await?;
            self.fetch_audio(&scratch_dir).await?;
        }

        self.merge().await
    }

    /// Runs both fetches as separate tasks and waits for them under the
    /// configured timeout. A failed fetch does not stop its sibling.
    async fn fetch_concurrently(&self, scratch_dir: &Path) -> Result<(), BatchError> {
        let timeout = Duration::from_secs(self.settings.advanced.fetch_timeout_secs);

        let mut join_set = JoinSet::new();
        for kind in [StreamKind::Video, StreamKind::Audio] {
            let job = self.fetch_job(kind, scratch_dir);
            join_set.spawn(async move { (kind, run_fetch(job).await) });
        }

        let mut video_result = None;
        let mut audio_result = None;
        let rendezvous = tokio::time::timeout(timeout, async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((StreamKind::Video, result)) => video_result = Some(result),
                    Ok((StreamKind::Audio, result)) => audio_result = Some(result),
                    Err(e) => tracing::error!("Fetch task for \"{}\" failed: {}", self.info.title, e),
                }
            }
        })
        .await;

        if rendezvous.is_err() {
            let video_done = !self.is_fetching_video();
            let audio_done = !self.is_fetching_audio();

            self.current_token().cancel();
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}

            tracing::warn!(
                title = %self.info.title,
                "Fetching took longer than {}s; raise advanced.fetch_timeout_secs for slow connections",
                timeout.as_secs()
            );
            return Err(BatchError::Timeout {
                title: self.info.title.clone(),
                timeout,
                video_done,
                audio_done,
            });
        }

        for (kind, result) in [(StreamKind::Video, video_result), (StreamKind::Audio, audio_result)] {
            match result {
                Some(result) => result?,
                None => {
                    return Err(BatchError::Fetch {
                        title: self.info.title.clone(),
                        stream: kind,
                        source: anyhow!("fetch task ended without a result"),
                    })
                }
            }
        }

        Ok(())
    }

    fn open_output(&self, path: &Path) {
        *self.output.lock().unwrap() = Some(path.to_path_buf());
        self.state.merging.store(true, Ordering::SeqCst);
    }

    /// Releases the output handle. Returns the path if it was still held and
    /// a merge was in progress.
    fn release_output(&self) -> Option<PathBuf> {
        let held = self.output.lock().unwrap().take();
        let was_merging = self.state.merging.swap(false, Ordering::SeqCst);
        held.filter(|_| was_merging)
    }

    async fn remove_unfinished(&self, path: &Path) {
        if !self.settings.download.remove_unfinished {
            tracing::warn!(title = %self.info.title, "Leaving unfinished output {}", path.display());
            return;
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => self.services.events.emit(&UnitEvent::UnfinishedRemoved {
                title: self.info.title.clone(),
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    /// Muxes this unit's two scratch streams into the final output, then
    /// deletes them.
    pub async fn merge(&self) -> Result<PathBuf, BatchError> {
        let mut inputs = Vec::with_capacity(2);
        for kind in [StreamKind::Video, StreamKind::Audio] {
            let found = scratch::find_by_marker(self.scratch_dir(), &self.marker(kind)).await?;
            match found {
                Some(path) => inputs.push(path),
                None => {
                    tracing::error!(title = %self.info.title, "No {} scratch file to merge", kind);
                    return Err(BatchError::Merge {
                        title: self.info.title.clone(),
                        stream: kind,
                    });
                }
            }
        }
        let (video, audio) = (&inputs[0], &inputs[1]);

        let output = self.final_path();
        let encode = &self.settings.encode;
        let opts = EncodeOptions {
            codec: encode.codec.clone(),
            audio_codec: encode.audio_codec.clone(),
            preset: Some(encode.preset.clone()).filter(|p| !p.is_empty()),
            threads: encode.threads,
        };

        self.open_output(&output);
        self.services.events.emit(&UnitEvent::MergeStarted {
            title: self.info.title.clone(),
            path: output.clone(),
        });

        let result = self
            .services
            .muxer
            .combine(video, audio, &output, &opts, self.current_token())
            .await;

        let unfinished = self.release_output();
        if let Err(source) = result {
            if let Some(partial) = unfinished {
                self.remove_unfinished(&partial).await;
            }
            tracing::error!(title = %self.info.title, "{} failed: {:#}", self.services.muxer.name(), source);
            return Err(BatchError::Mux {
                title: self.info.title.clone(),
                source,
            });
        }

        self.services.events.emit(&UnitEvent::MergeFinished {
            title: self.info.title.clone(),
            path: output.clone(),
        });

        let mut removed = 0;
        for input in &inputs {
            match tokio::fs::remove_file(input).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Could not remove {}: {}", input.display(), e),
            }
        }
        self.services.events.emit(&UnitEvent::ScratchCleaned {
            title: self.info.title.clone(),
            removed,
        });

        Ok(output)
    }

    async fn remove_own_scratch(&self) -> usize {
        let mut removed = 0;
        for kind in [StreamKind::Video, StreamKind::Audio] {
            let marker = self.marker(kind);
            removed += scratch::remove_by_marker(self.scratch_dir(), &marker).await;
            removed += scratch::remove_by_marker(&self.output_dir, &marker).await;
        }
        removed
    }

    /// Stops whatever the unit is doing and removes what it leaves behind.
    /// Safe to call any number of times, started or not.
    pub async fn exit(&self) {
        self.current_token().cancel();

        if let Some(partial) = self.release_output() {
            self.remove_unfinished(&partial).await;
        }

        let removed = self.remove_own_scratch().await
            + scratch::remove_partial_downloads(&self.output_dir, &self.stem).await;
        if removed > 0 {
            self.services.events.emit(&UnitEvent::ScratchCleaned {
                title: self.info.title.clone(),
                removed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::*;
    use mediabatch_core::core::events::UnitEvent;

    const URL: &str = "https://www.youtube.com/watch?v=clip";

    fn unit_with(
        dir: &Path,
        extractor: FakeExtractor,
        muxer: FakeMuxer,
        configure: impl FnOnce(&mut AppSettings),
    ) -> (MediaUnit, Arc<FakeExtractor>, Arc<FakeMuxer>, Arc<RecordingEmitter>, Arc<AppSettings>) {
        let mut settings = test_settings(dir);
        configure(&mut settings);
        let settings = Arc::new(settings);
        let extractor = Arc::new(extractor);
        let muxer = Arc::new(muxer);
        let (services, events) = services(extractor.clone(), muxer.clone());
        let unit = MediaUnit::new(
            video_info("Clip: Part 1?", URL),
            settings.paths.output_dir.clone(),
            "",
            settings.clone(),
            services,
        );
        (unit, extractor, muxer, events, settings)
    }

    async fn wait_until(check: impl Fn() -> bool) {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn both_mode_leaves_one_output_and_no_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, muxer, events, settings) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new(), |_| {});

        let outcome = unit.run().await.unwrap();

        let expected = output_path(&settings, "Clip Part 1");
        assert_eq!(outcome, UnitOutcome::Completed(expected.clone()));
        assert_eq!(file_names(&settings.paths.output_dir), vec!["Clip Part 1.mp4"]);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert_eq!(extractor.fetch_calls(), 2);
        assert_eq!(muxer.combine_calls(), 1);
        assert!(!unit.is_fetching_video() && !unit.is_fetching_audio() && !unit.is_merging());
        assert_eq!(
            events.count(|e| matches!(e, UnitEvent::MergeFinished { .. })),
            1
        );
    }

    #[tokio::test]
    async fn scratch_names_carry_the_correlation_token() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, _, _, _) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new(), |_| {});

        unit.run().await.unwrap();

        // The audio fetch may observe the video scratch file but never a foreign one.
        for (_, names) in extractor.snapshots() {
            assert!(names.iter().all(|n| n.contains(unit.token())));
        }
    }

    #[tokio::test]
    async fn existing_output_is_skipped_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, muxer, events, settings) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new(), |_| {});
        let existing = output_path(&settings, "Clip Part 1");
        std::fs::write(&existing, b"done").unwrap();

        let outcome = unit.run().await.unwrap();

        assert_eq!(outcome, UnitOutcome::Skipped(existing.clone()));
        assert_eq!(extractor.fetch_calls(), 0);
        assert_eq!(muxer.combine_calls(), 0);
        assert_eq!(std::fs::read(&existing).unwrap(), b"done");
        assert_eq!(file_names(&settings.paths.output_dir), vec!["Clip Part 1.mp4"]);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert_eq!(events.count(|e| matches!(e, UnitEvent::Skipped { .. })), 1);
    }

    #[tokio::test]
    async fn rerun_after_success_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, _, _, _) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new(), |_| {});

        unit.run().await.unwrap();
        let second = unit.run().await.unwrap();

        assert!(matches!(second, UnitOutcome::Skipped(_)));
        assert_eq!(extractor.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_and_sequential_fetch_match_byte_for_byte() {
        let concurrent_dir = tempfile::tempdir().unwrap();
        let (unit, _, _, _, settings) = unit_with(
            concurrent_dir.path(),
            FakeExtractor::new().with_delay(StreamKind::Video, Duration::from_millis(30)),
            FakeMuxer::new(),
            |_| {},
        );
        let concurrent = std::fs::read(match unit.run().await.unwrap() {
            UnitOutcome::Completed(p) => p,
            other => panic!("unexpected {:?}", other),
        })
        .unwrap();
        assert!(file_names(&settings.paths.scratch_dir).is_empty());

        let sequential_dir = tempfile::tempdir().unwrap();
        let (unit, _, _, _, settings) = unit_with(
            sequential_dir.path(),
            FakeExtractor::new().with_delay(StreamKind::Video, Duration::from_millis(30)),
            FakeMuxer::new(),
            |s| s.advanced.concurrent_fetch = false,
        );
        let sequential = std::fs::read(match unit.run().await.unwrap() {
            UnitOutcome::Completed(p) => p,
            other => panic!("unexpected {:?}", other),
        })
        .unwrap();
        assert!(file_names(&settings.paths.scratch_dir).is_empty());

        assert_eq!(concurrent, sequential);
    }

    #[tokio::test]
    async fn fetch_flags_are_visible_while_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, _, _) = unit_with(
            dir.path(),
            FakeExtractor::new().with_delay(StreamKind::Video, Duration::from_millis(200)),
            FakeMuxer::new(),
            |_| {},
        );

        let scratch = dir.path().join("cache");
        tokio::select! {
            _ = unit.fetch_video(&scratch) => panic!("fetch finished before the flag was seen"),
            _ = wait_until(|| unit.is_fetching_video()) => {}
        }
        assert!(!unit.is_fetching_video());
    }

    #[tokio::test]
    async fn abort_during_merge_removes_partial_output_and_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, events, settings) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new().hanging(), |_| {});

        tokio::select! {
            _ = unit.run() => panic!("hanging mux finished"),
            _ = wait_until(|| unit.is_merging()) => {}
        }
        unit.exit().await;

        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert!(file_names(&settings.paths.output_dir).is_empty());
        assert!(!unit.is_merging());
        assert_eq!(
            events.count(|e| matches!(e, UnitEvent::UnfinishedRemoved { .. })),
            1
        );
    }

    #[tokio::test]
    async fn abort_during_merge_keeps_partial_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, _, settings) = unit_with(
            dir.path(),
            FakeExtractor::new(),
            FakeMuxer::new().hanging(),
            |s| s.download.remove_unfinished = false,
        );

        tokio::select! {
            _ = unit.run() => panic!("hanging mux finished"),
            _ = wait_until(|| unit.is_merging()) => {}
        }
        unit.exit().await;

        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert_eq!(file_names(&settings.paths.output_dir), vec!["Clip Part 1.mp4"]);
    }

    #[tokio::test]
    async fn exit_while_fetching_keeps_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, events, settings) = unit_with(
            dir.path(),
            FakeExtractor::new().hanging(StreamKind::Audio),
            FakeMuxer::new(),
            |_| {},
        );
        let unrelated = settings.paths.output_dir.join("Other.mp4");
        std::fs::write(&unrelated, b"keep").unwrap();

        tokio::select! {
            _ = unit.run() => panic!("hanging fetch finished"),
            _ = wait_until(|| !unit.is_fetching_video() && unit.is_fetching_audio()) => {}
        }
        unit.exit().await;
        unit.exit().await;

        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert_eq!(file_names(&settings.paths.output_dir), vec!["Other.mp4"]);
        assert_eq!(
            events.count(|e| matches!(e, UnitEvent::UnfinishedRemoved { .. })),
            0
        );
    }

    #[tokio::test]
    async fn rendezvous_timeout_fails_the_unit_and_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, muxer, _, settings) = unit_with(
            dir.path(),
            FakeExtractor::new().hanging(StreamKind::Audio),
            FakeMuxer::new(),
            |s| s.advanced.fetch_timeout_secs = 1,
        );

        let err = unit.run().await.unwrap_err();

        match err {
            BatchError::Timeout {
                video_done,
                audio_done,
                ..
            } => {
                assert!(video_done);
                assert!(!audio_done);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!unit.is_fetching_audio());
        assert_eq!(muxer.combine_calls(), 0);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
        assert!(file_names(&settings.paths.output_dir).is_empty());
    }

    #[tokio::test]
    async fn failed_stream_lets_sibling_finish_then_fails_before_mux() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, muxer, _, settings) = unit_with(
            dir.path(),
            FakeExtractor::new()
                .failing(StreamKind::Video)
                .with_delay(StreamKind::Audio, Duration::from_millis(50)),
            FakeMuxer::new(),
            |_| {},
        );

        let err = unit.run().await.unwrap_err();

        assert!(matches!(
            err,
            BatchError::Fetch {
                stream: StreamKind::Video,
                ..
            }
        ));
        assert_eq!(extractor.fetch_calls(), 2);
        assert_eq!(muxer.combine_calls(), 0);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
    }

    #[tokio::test]
    async fn missing_scratch_stream_is_a_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, muxer, _, settings) = unit_with(
            dir.path(),
            FakeExtractor::new().producing_nothing(StreamKind::Audio),
            FakeMuxer::new(),
            |_| {},
        );

        let err = unit.run().await.unwrap_err();

        assert!(matches!(
            err,
            BatchError::Merge {
                stream: StreamKind::Audio,
                ..
            }
        ));
        assert_eq!(muxer.combine_calls(), 0);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
    }

    #[tokio::test]
    async fn mux_failure_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, _, settings) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new().failing(), |_| {});

        let err = unit.run().await.unwrap_err();

        assert!(matches!(err, BatchError::Mux { .. }));
        assert!(!unit.is_merging());
        assert!(file_names(&settings.paths.output_dir).is_empty());
        assert!(file_names(&settings.paths.scratch_dir).is_empty());
    }

    #[tokio::test]
    async fn audio_mode_writes_straight_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, extractor, muxer, _, settings) = unit_with(
            dir.path(),
            FakeExtractor::new(),
            FakeMuxer::new(),
            |s| s.download.mode = DownloadMode::Audio,
        );

        let outcome = unit.run().await.unwrap();

        let expected = settings.paths.output_dir.join("Clip Part 1.m4a");
        assert_eq!(outcome, UnitOutcome::Completed(expected));
        assert_eq!(extractor.fetched(), vec![(URL.to_string(), StreamKind::Audio)]);
        assert_eq!(muxer.combine_calls(), 0);
        assert!(file_names(&settings.paths.scratch_dir).is_empty());

        let again = unit.run().await.unwrap();
        assert!(matches!(again, UnitOutcome::Skipped(_)));
        assert_eq!(extractor.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn exit_on_a_unit_that_never_ran() {
        let dir = tempfile::tempdir().unwrap();
        let (unit, _, _, events, settings) =
            unit_with(dir.path(), FakeExtractor::new(), FakeMuxer::new(), |_| {});

        unit.exit().await;
        unit.exit().await;

        assert!(events.events().is_empty());
        assert!(file_names(&settings.paths.output_dir).is_empty());
    }

    #[tokio::test]
    async fn classify_wraps_resolution_failures() {
        let extractor = FakeExtractor::new().with_info(video_info("A", "https://a"));

        let info = MediaUnit::classify(&extractor, "https://a").await.unwrap();
        assert_eq!(info.title, "A");

        let err = MediaUnit::classify(&extractor, "https://missing").await.unwrap_err();
        assert!(matches!(err, BatchError::Resolution { ref locator, .. } if locator == "https://missing"));
    }
}
