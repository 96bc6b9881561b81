// Executable providers - the `yt-dlp` binary and legacy `youtube-dl`
//
// Both accept the same core flags and emit the same info JSON. yt-dlp can
// report the final file path after post-processing; youtube-dl can't, so
// its artifacts are found by probing the downloads directory.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::ytdl::{self, DownloadPlan};
use super::MediaProvider;
use crate::resolver::classifier;
use crate::resolver::config::ResolverConfig;
use crate::resolver::errors::{ResolveError, Result};
use crate::resolver::formats::{self, SONG_AUDIO_CODEC, SONG_AUDIO_QUALITY, STREAM_720_SPEC};
use crate::resolver::models::{DownloadArtifact, DownloadMode, FormatDescriptor, MediaSummary};
use crate::resolver::utils::{first_line, run_output_with_timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableFlavor {
    YtDlp,
    YoutubeDl,
}

impl ExecutableFlavor {
    fn name(&self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::YoutubeDl => "youtube-dl",
        }
    }

    /// `--print after_move:filepath` exists only in yt-dlp
    fn prints_final_path(&self) -> bool {
        matches!(self, Self::YtDlp)
    }
}

pub struct ExecutableProvider {
    flavor: ExecutableFlavor,
    path: String,
    config: ResolverConfig,
}

impl ExecutableProvider {
    pub fn new(flavor: ExecutableFlavor, path: String, config: ResolverConfig) -> Self {
        Self {
            flavor,
            path,
            config,
        }
    }

    /// Flags shared by every invocation
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
        ];

        if self.config.geo_bypass {
            args.push("--geo-bypass".to_string());
        }
        if !self.config.check_certificate {
            args.push("--no-check-certificate".to_string());
        }

        // Cookies
        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        // Proxy
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    fn search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let mut args = self.common_args();
        args.push("--dump-json".to_string());
        if classifier::is_media_url(query) {
            args.push("--no-playlist".to_string());
            args.push(classifier::normalize(query));
        } else {
            args.push("--flat-playlist".to_string());
            args.push(ytdl::search_target(query, limit));
        }
        args
    }

    fn info_args(&self, url: &str, format: Option<&str>) -> Vec<String> {
        let mut args = self.common_args();
        args.extend(["--dump-json".to_string(), "--no-playlist".to_string()]);
        if let Some(format) = format {
            args.push("-f".to_string());
            args.push(format.to_string());
        }
        args.push(classifier::normalize(url));
        args
    }

    fn stream_args(&self, url: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--no-playlist".to_string(),
            "-g".to_string(),
            "-f".to_string(),
            STREAM_720_SPEC.to_string(),
            classifier::normalize(url),
        ]);
        args
    }

    fn playlist_args(&self, url: &str, limit: usize) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "-i".to_string(),
            "--get-id".to_string(),
            "--flat-playlist".to_string(),
            "--playlist-end".to_string(),
            limit.to_string(),
            "--skip-download".to_string(),
            url.trim().to_string(),
        ]);
        args
    }

    fn download_args(&self, url: &str, plan: &DownloadPlan) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "-f".to_string(),
            plan.format.clone(),
            "-o".to_string(),
            plan.output_template.clone(),
        ]);

        if let Some(container) = plan.merge_container() {
            args.push("--merge-output-format".to_string());
            args.push(container.to_string());
        }

        if plan.extract_mp3 {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                SONG_AUDIO_CODEC.to_string(),
                "--audio-quality".to_string(),
                format!("{}K", SONG_AUDIO_QUALITY),
            ]);
        }

        if self.flavor.prints_final_path() {
            args.extend([
                "--no-simulate".to_string(),
                "--print".to_string(),
                "after_move:filepath".to_string(),
            ]);
        }

        args.push(classifier::normalize(url));
        args
    }

    async fn run(&self, args: Vec<String>, timeout_secs: u64) -> Result<std::process::Output> {
        debug!(provider = self.name(), "running {} {}", self.path, args.join(" "));
        let output = run_output_with_timeout(&self.path, &args, timeout_secs).await?;
        if !output.status.success() && !ytdl::tolerable_failure(&output) {
            return Err(ytdl::backend_failure(self.name(), &output.stderr));
        }
        Ok(output)
    }

    async fn deep_info(&self, url: &str, format: Option<&str>) -> Result<serde_json::Value> {
        let output = self
            .run(self.info_args(url, format), self.config.search_timeout_secs)
            .await?;
        ytdl::parse_json(&output.stdout)
    }
}

#[async_trait]
impl MediaProvider for ExecutableProvider {
    fn name(&self) -> &'static str {
        self.flavor.name()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaSummary>> {
        let limit = if classifier::is_media_url(query) { 1 } else { limit };
        let output = self
            .run(self.search_args(query, limit), self.config.search_timeout_secs)
            .await?;

        // one JSON object per line
        Ok(ytdl::parse_json_lines(&output.stdout)
            .iter()
            .flat_map(|info| ytdl::summaries_from_info(info, limit))
            .take(limit)
            .collect())
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<FormatDescriptor>> {
        let info = self.deep_info(url, None).await?;
        let raw = info
            .get("formats")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| ResolveError::Parse("No formats array in JSON".to_string()))?;
        Ok(formats::filter_formats(raw, url))
    }

    async fn download(
        &self,
        url: &str,
        mode: &DownloadMode,
        dir: &Path,
    ) -> Result<DownloadArtifact> {
        let plan = DownloadPlan::for_mode(mode, dir);

        let mut native = None;
        if plan.is_id_based() {
            let info = self.deep_info(url, Some(&plan.format)).await?;
            native = ytdl::id_and_ext(&info);
            if let Some((id, ext)) = &native {
                if let Some(path) = plan.locate_with_ext(dir, id, ext.as_deref()) {
                    info!(
                        provider = self.name(),
                        path = %path.display(),
                        "artifact already cached"
                    );
                    return Ok(DownloadArtifact::local(path.to_string_lossy()));
                }
            }
        }

        let output = self
            .run(self.download_args(url, &plan), self.config.download_timeout_secs)
            .await?;

        let printed = first_line(&output.stdout).filter(|p| Path::new(p).is_file());
        let located = printed.or_else(|| {
            let found = match &native {
                Some((id, ext)) => plan.locate_with_ext(dir, id, ext.as_deref()),
                None => plan.locate(dir, None),
            };
            found.map(|p| p.to_string_lossy().to_string())
        });

        located.map(DownloadArtifact::local).ok_or_else(|| {
            ResolveError::DownloadIncomplete(format!(
                "{} finished but no file was written",
                self.name()
            ))
        })
    }

    async fn stream_url(&self, url: &str) -> Result<String> {
        let output = self
            .run(self.stream_args(url), self.config.search_timeout_secs)
            .await?;
        first_line(&output.stdout)
            .ok_or_else(|| ResolveError::ExtractionFailed("no progressive stream URL".to_string()))
    }

    async fn playlist_ids(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        let output = self
            .run(self.playlist_args(url, limit), self.config.search_timeout_secs)
            .await?;
        Ok(ytdl::playlist_ids_from_lines(&output.stdout, limit))
    }
}
