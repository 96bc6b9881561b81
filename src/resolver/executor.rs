// Download executor - one request through Resolving → Fetching → Verifying
//
// Terminal states are `Done(artifact)` and `Failed(reason)`; callers that
// only care about the outcome use `download`, which maps `Failed` to `None`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier;
use super::config::ResolverConfig;
use super::errors::ResolveError;
use super::flags::FeatureFlags;
use super::models::{DownloadArtifact, DownloadMode, DownloadRequest};
use super::orchestrator::Orchestrator;
use super::providers::DownloadPlan;
use super::utils::run_on_worker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Resolving,
    Fetching,
    Verifying,
    Done(DownloadArtifact),
    Failed(ResolveError),
}

impl DownloadState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    pub fn into_artifact(self) -> Option<DownloadArtifact> {
        match self {
            Self::Done(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// Per-request working data carried between states
struct Job {
    source_ref: String,
    mode: DownloadMode,
    url: Option<String>,
    artifact: Option<DownloadArtifact>,
}

pub struct DownloadExecutor {
    orchestrator: Orchestrator,
    flags: Arc<dyn FeatureFlags>,
    config: ResolverConfig,
}

impl DownloadExecutor {
    pub fn new(
        orchestrator: Orchestrator,
        flags: Arc<dyn FeatureFlags>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            orchestrator,
            flags,
            config,
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.config.downloads_dir
    }

    /// The artifact, or `None` when any stage failed.
    pub async fn download(&self, request: DownloadRequest) -> Option<DownloadArtifact> {
        self.run(request).await.into_artifact()
    }

    /// Drives a request to its terminal state.
    pub async fn run(&self, request: DownloadRequest) -> DownloadState {
        let mut job = Job {
            source_ref: request.source_ref,
            mode: request.mode,
            url: None,
            artifact: None,
        };
        let mut state = DownloadState::Resolving;

        loop {
            debug!(state = state.label(), source = job.source_ref.as_str(), "download state");
            state = match state {
                DownloadState::Resolving => self.resolving(&mut job).await,
                DownloadState::Fetching => self.fetching(&mut job).await,
                DownloadState::Verifying => self.verifying(&mut job),
                terminal => {
                    match &terminal {
                        DownloadState::Done(artifact) => info!(
                            source = job.source_ref.as_str(),
                            location = artifact.location.as_str(),
                            stream = artifact.is_direct_stream_url,
                            "download finished"
                        ),
                        DownloadState::Failed(reason) => warn!(
                            source = job.source_ref.as_str(),
                            reason = %reason,
                            "download failed"
                        ),
                        _ => {}
                    }
                    return terminal;
                }
            };
        }
    }

    async fn resolving(&self, job: &mut Job) -> DownloadState {
        let source = job.source_ref.trim();
        let mut resolved_title = None;

        let url = if classifier::is_media_url(source) {
            classifier::normalize(source)
        } else {
            match self.orchestrator.resolve(source, 1).await.into_iter().next() {
                Some(item) if !item.canonical_url.is_empty() => {
                    resolved_title = Some(item.title);
                    item.canonical_url
                }
                _ => return DownloadState::Failed(ResolveError::NotFound),
            }
        };

        // song downloads are named after the track
        if job.mode.is_named() && job.mode.title().is_none() {
            let title = match resolved_title {
                Some(title) => title,
                None => self.orchestrator.title(&url).await,
            };
            job.mode = job.mode.clone().with_default_title(&title);
        }

        job.url = Some(url);
        DownloadState::Fetching
    }

    async fn fetching(&self, job: &mut Job) -> DownloadState {
        let Some(url) = job.url.clone() else {
            return DownloadState::Failed(ResolveError::NotFound);
        };

        if job.mode == DownloadMode::VideoCapped720p
            && self.flags.is_enabled(self.config.direct_stream_flag).await
        {
            return match self.orchestrator.stream_url(&url).await {
                Some(stream) => DownloadState::Done(DownloadArtifact::stream(stream)),
                None => DownloadState::Failed(ResolveError::ExtractionFailed(
                    "no provider returned a stream URL".to_string(),
                )),
            };
        }

        let dir = self.config.downloads_dir.clone();
        if let Some(path) = cached_artifact(&url, &job.mode, &dir) {
            info!(path = %path.display(), "reusing downloaded file");
            return DownloadState::Done(DownloadArtifact::local(path.to_string_lossy()));
        }

        if let Err(e) = self.config.ensure_downloads_dir() {
            return DownloadState::Failed(e.into());
        }

        let mut last_error = None;
        for provider in self.orchestrator.registry().providers() {
            let name = provider.name();
            let call = {
                let provider = Arc::clone(provider);
                let (url, mode, dir) = (url.clone(), job.mode.clone(), dir.clone());
                async move { provider.download(&url, &mode, &dir).await }
            };

            match run_on_worker(self.config.download_timeout_secs, call).await {
                Ok(artifact) => {
                    debug!(
                        provider = name,
                        location = artifact.location.as_str(),
                        "provider fetched"
                    );
                    job.artifact = Some(artifact);
                    return DownloadState::Verifying;
                }
                Err(ResolveError::BackendUnavailable(reason)) => {
                    debug!(provider = name, reason = reason.as_str(), "provider cannot download");
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        DownloadState::Failed(last_error.unwrap_or_else(|| {
            ResolveError::BackendUnavailable("no provider can download".to_string())
        }))
    }

    fn verifying(&self, job: &mut Job) -> DownloadState {
        let Some(artifact) = job.artifact.take() else {
            return DownloadState::Failed(ResolveError::DownloadIncomplete(
                "no artifact to verify".to_string(),
            ));
        };

        if artifact.is_direct_stream_url || Path::new(&artifact.location).is_file() {
            DownloadState::Done(artifact)
        } else {
            DownloadState::Failed(ResolveError::DownloadIncomplete(format!(
                "{} does not exist",
                artifact.location
            )))
        }
    }
}

/// Previously downloaded file for this url/mode, if any
fn cached_artifact(url: &str, mode: &DownloadMode, dir: &Path) -> Option<PathBuf> {
    let plan = DownloadPlan::for_mode(mode, dir);
    if plan.is_id_based() {
        let id = classifier::extract_id(url);
        if id.is_empty() {
            return None;
        }
        plan.locate(dir, Some(&id))
    } else {
        plan.locate(dir, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::errors::Result;
    use crate::resolver::flags::StaticFlags;
    use crate::resolver::models::{MediaSummary, RawRecord};
    use crate::resolver::providers::{MediaProvider, ProviderRegistry};
    use crate::resolver::utils::sanitize_filename;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const VIDEO_ID: &str = "dQw4w9WgXcQ";

    struct FakeBackend {
        writes_file: bool,
        finds: bool,
        downloads: AtomicUsize,
    }

    impl FakeBackend {
        fn new(writes_file: bool, finds: bool) -> Arc<Self> {
            Arc::new(Self {
                writes_file,
                finds,
                downloads: AtomicUsize::new(0),
            })
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaProvider for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<MediaSummary>> {
            if !self.finds {
                return Ok(Vec::new());
            }
            Ok(vec![RawRecord {
                title: Some("Song Title - Live".to_string()),
                id: Some(VIDEO_ID.to_string()),
                ..Default::default()
            }
            .into_summary()])
        }

        async fn download(
            &self,
            url: &str,
            mode: &DownloadMode,
            dir: &Path,
        ) -> Result<DownloadArtifact> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let path = match mode {
                DownloadMode::NamedSongAudio { title, .. } => {
                    dir.join(format!("{}.mp3", sanitize_filename(title.as_deref().unwrap_or(""))))
                }
                DownloadMode::VideoCapped720p => {
                    dir.join(format!("{}.mp4", classifier::extract_id(url)))
                }
                _ => dir.join(format!("{}.webm", classifier::extract_id(url))),
            };
            if self.writes_file {
                std::fs::write(&path, b"media")?;
            }
            Ok(DownloadArtifact::local(path.to_string_lossy()))
        }

        async fn stream_url(&self, _url: &str) -> Result<String> {
            Ok("https://rr1.googlevideo.com/videoplayback?id=1".to_string())
        }
    }

    /// Search works, downloads report unavailable
    struct SearchOnly;

    #[async_trait]
    impl MediaProvider for SearchOnly {
        fn name(&self) -> &'static str {
            "search-only"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<MediaSummary>> {
            Ok(Vec::new())
        }
    }

    fn executor(
        providers: Vec<Arc<dyn MediaProvider>>,
        dir: &TempDir,
        flags: StaticFlags,
    ) -> DownloadExecutor {
        let config = ResolverConfig::default().with_downloads_dir(dir.path());
        let orchestrator = Orchestrator::new(ProviderRegistry::new(providers), &config);
        DownloadExecutor::new(orchestrator, Arc::new(flags), config)
    }

    #[tokio::test]
    async fn test_second_request_hits_cache() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new(true, true);
        let exec = executor(
            vec![backend.clone() as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let first = exec.download(DownloadRequest::audio("never gonna give you up")).await.unwrap();
        assert!(first.location.ends_with("dQw4w9WgXcQ.webm"));
        assert_eq!(backend.downloads(), 1);

        let second = exec
            .download(DownloadRequest::audio("https://youtu.be/dQw4w9WgXcQ?t=5"))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(backend.downloads(), 1);
    }

    #[tokio::test]
    async fn test_no_search_results_fails_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new(true, false);
        let exec = executor(
            vec![backend.clone() as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let state = exec.run(DownloadRequest::audio("nothing matches")).await;
        assert_eq!(state, DownloadState::Failed(ResolveError::NotFound));
        assert_eq!(backend.downloads(), 0);
        assert!(exec.download(DownloadRequest::video("nothing matches")).await.is_none());
    }

    #[tokio::test]
    async fn test_direct_stream_when_flag_enabled() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new(true, true);
        let exec = executor(
            vec![backend.clone() as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::new([1]),
        );

        let artifact = exec
            .download(DownloadRequest::video("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert!(artifact.is_direct_stream_url);
        assert!(artifact.location.starts_with("https://"));
        assert_eq!(backend.downloads(), 0);

        // audio is never streamed
        let audio = exec
            .download(DownloadRequest::audio("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert!(!audio.is_direct_stream_url);
    }

    #[tokio::test]
    async fn test_video_downloads_locally_when_flag_disabled() {
        let dir = TempDir::new().unwrap();
        let exec = executor(
            vec![FakeBackend::new(true, true) as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let artifact = exec
            .download(DownloadRequest::video("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert!(!artifact.is_direct_stream_url);
        assert!(artifact.location.ends_with("dQw4w9WgXcQ.mp4"));
    }

    #[tokio::test]
    async fn test_audio_request_skips_cached_video() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new(true, true);
        let exec = executor(
            vec![backend.clone() as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let video = exec
            .download(DownloadRequest::video("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert!(video.location.ends_with("dQw4w9WgXcQ.mp4"));

        let audio = exec
            .download(DownloadRequest::audio("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert!(audio.location.ends_with("dQw4w9WgXcQ.webm"));
        assert_eq!(backend.downloads(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_fails_verification() {
        let dir = TempDir::new().unwrap();
        let exec = executor(
            vec![FakeBackend::new(false, true) as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let state = exec.run(DownloadRequest::audio("https://youtu.be/dQw4w9WgXcQ")).await;
        assert!(matches!(state, DownloadState::Failed(ResolveError::DownloadIncomplete(_))));
    }

    #[tokio::test]
    async fn test_named_song_takes_resolved_title() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new(true, true);
        let exec = executor(
            vec![Arc::new(SearchOnly) as Arc<dyn MediaProvider>, backend.clone()],
            &dir,
            StaticFlags::none(),
        );

        let request = DownloadRequest::new(
            "song title live",
            DownloadMode::NamedSongAudio {
                format: None,
                title: None,
            },
        );
        let artifact = exec.download(request.clone()).await.unwrap();
        assert!(artifact.location.ends_with("Song_Title_Live.mp3"));
        assert_eq!(backend.downloads(), 1);

        // cached by sanitized title
        exec.download(request).await.unwrap();
        assert_eq!(backend.downloads(), 1);
    }

    #[tokio::test]
    async fn test_no_capable_provider() {
        let dir = TempDir::new().unwrap();
        let exec = executor(
            vec![Arc::new(SearchOnly) as Arc<dyn MediaProvider>],
            &dir,
            StaticFlags::none(),
        );

        let state = exec.run(DownloadRequest::audio("https://youtu.be/dQw4w9WgXcQ")).await;
        assert!(matches!(state, DownloadState::Failed(ResolveError::BackendUnavailable(_))));
        assert!(state.is_terminal());
        assert_eq!(state.label(), "failed");
    }
}
