// Python provider - drives the `yt_dlp` module through an embedded script
//
// Highest priority backend: the module handles bot checks and cookies
// better than the standalone binaries and returns full info dicts.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

use super::ytdl::{self, DownloadPlan};
use super::MediaProvider;
use crate::resolver::classifier;
use crate::resolver::config::ResolverConfig;
use crate::resolver::errors::{ResolveError, Result};
use crate::resolver::formats::{self, SONG_AUDIO_CODEC, SONG_AUDIO_QUALITY, STREAM_720_SPEC};
use crate::resolver::models::{DownloadArtifact, DownloadMode, FormatDescriptor, MediaSummary};
use crate::resolver::utils::run_output_with_timeout;

/// argv[1] = options JSON, argv[2] = target, argv[3] = "1" to download
const EXTRACT_SCRIPT: &str = r#"
import json, sys
try:
    import yt_dlp
except ImportError as exc:
    sys.stderr.write("No module named yt_dlp: %s\n" % exc)
    sys.exit(3)
opts = json.loads(sys.argv[1])
with yt_dlp.YoutubeDL(opts) as ydl:
    info = ydl.extract_info(sys.argv[2], download=sys.argv[3] == "1")
    print("null" if info is None else json.dumps(ydl.sanitize_info(info)))
"#;

pub struct PythonProvider {
    python_cmd: String,
    config: ResolverConfig,
}

impl PythonProvider {
    pub fn new(python_cmd: String, config: ResolverConfig) -> Self {
        Self { python_cmd, config }
    }

    /// Options shared by every call
    fn base_options(&self) -> Map<String, Value> {
        let mut opts = Map::new();
        opts.insert("quiet".into(), json!(true));
        opts.insert("no_warnings".into(), json!(true));
        opts.insert("noprogress".into(), json!(true));
        opts.insert("noplaylist".into(), json!(true));
        opts.insert("geo_bypass".into(), json!(self.config.geo_bypass));
        opts.insert("nocheckcertificate".into(), json!(!self.config.check_certificate));
        opts.insert("socket_timeout".into(), json!(self.config.socket_timeout_secs));
        opts.insert("retries".into(), json!(self.config.retries));
        opts.insert(
            "http_headers".into(),
            json!({ "User-Agent": self.config.user_agent }),
        );
        if let Some(proxy) = &self.config.proxy {
            opts.insert("proxy".into(), json!(proxy));
        }
        if let Some(path) = &self.config.cookies_path {
            opts.insert("cookiefile".into(), json!(path));
        }
        opts
    }

    fn download_options(&self, plan: &DownloadPlan) -> Map<String, Value> {
        let mut opts = self.base_options();
        opts.insert("format".into(), json!(plan.format));
        opts.insert("outtmpl".into(), json!(plan.output_template));
        if let Some(container) = plan.merge_container() {
            opts.insert("merge_output_format".into(), json!(container));
        }
        if plan.extract_mp3 {
            opts.insert("prefer_ffmpeg".into(), json!(true));
            opts.insert(
                "postprocessors".into(),
                json!([{
                    "key": "FFmpegExtractAudio",
                    "preferredcodec": SONG_AUDIO_CODEC,
                    "preferredquality": SONG_AUDIO_QUALITY,
                }]),
            );
        }
        opts
    }

    async fn extract(
        &self,
        opts: Map<String, Value>,
        target: &str,
        download: bool,
        timeout_secs: u64,
    ) -> Result<Value> {
        let args = vec![
            "-c".to_string(),
            EXTRACT_SCRIPT.to_string(),
            Value::Object(opts).to_string(),
            target.to_string(),
            if download { "1" } else { "0" }.to_string(),
        ];

        debug!(provider = self.name(), url = target, download, "running yt_dlp module");
        let output = run_output_with_timeout(&self.python_cmd, &args, timeout_secs).await?;

        if !output.status.success() {
            return Err(ytdl::backend_failure(self.name(), &output.stderr));
        }

        ytdl::parse_json(&output.stdout)
    }

    async fn deep_info(&self, url: &str, format: Option<&str>) -> Result<Value> {
        let mut opts = self.base_options();
        opts.insert("skip_download".into(), json!(true));
        if let Some(format) = format {
            opts.insert("format".into(), json!(format));
        }
        self.extract(opts, &classifier::normalize(url), false, self.config.search_timeout_secs)
            .await
    }
}

#[async_trait]
impl MediaProvider for PythonProvider {
    fn name(&self) -> &'static str {
        "python-yt_dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaSummary>> {
        let is_url = classifier::is_media_url(query);
        let mut opts = self.base_options();
        opts.insert("skip_download".into(), json!(true));
        // flat listing for searches; direct URLs need the full record
        opts.insert("extract_flat".into(), json!(!is_url));

        let target = if is_url {
            classifier::normalize(query)
        } else {
            ytdl::search_target(query, limit)
        };
        let info = self
            .extract(opts, &target, false, self.config.search_timeout_secs)
            .await?;

        let limit = if is_url { 1 } else { limit };
        Ok(ytdl::summaries_from_info(&info, limit))
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<FormatDescriptor>> {
        let info = self.deep_info(url, None).await?;
        let raw = info
            .get("formats")
            .and_then(Value::as_array)
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
        let url = classifier::normalize(url);

        // id-based artifacts can be located before fetching anything
        if plan.is_id_based() {
            let info = self.deep_info(&url, Some(&plan.format)).await?;
            if let Some((id, ext)) = ytdl::id_and_ext(&info) {
                if let Some(path) = plan.locate_with_ext(dir, &id, ext.as_deref()) {
                    info!(
                        provider = self.name(),
                        path = %path.display(),
                        "artifact already cached"
                    );
                    return Ok(DownloadArtifact::local(path.to_string_lossy()));
                }
            }
        }

        let info = self
            .extract(
                self.download_options(&plan),
                &url,
                true,
                self.config.download_timeout_secs,
            )
            .await?;

        let located = match ytdl::id_and_ext(&info) {
            Some((id, ext)) => plan.locate_with_ext(dir, &id, ext.as_deref()),
            None => plan.locate(dir, None),
        };

        located
            .map(|path| DownloadArtifact::local(path.to_string_lossy()))
            .ok_or_else(|| {
                ResolveError::DownloadIncomplete(format!(
                    "{} finished but no file was written",
                    self.name()
                ))
            })
    }

    async fn stream_url(&self, url: &str) -> Result<String> {
        let info = self.deep_info(url, Some(STREAM_720_SPEC)).await?;
        info.get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::ExtractionFailed("no progressive stream URL".to_string()))
    }

    async fn playlist_ids(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        let mut opts = self.base_options();
        opts.insert("noplaylist".into(), json!(false));
        opts.insert("ignoreerrors".into(), json!(true));
        opts.insert("skip_download".into(), json!(true));
        opts.insert("extract_flat".into(), json!(true));
        opts.insert("playlistend".into(), json!(limit));

        let info = self
            .extract(opts, url.trim(), false, self.config.search_timeout_secs)
            .await?;
        Ok(ytdl::playlist_ids_from_info(&info, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> PythonProvider {
        let config =
            ResolverConfig::default().with_proxy(Some("socks5://127.0.0.1:9050".to_string()));
        PythonProvider::new("python3".to_string(), config)
    }

    #[test]
    fn test_base_options() {
        let opts = provider().base_options();
        assert_eq!(opts["quiet"], json!(true));
        assert_eq!(opts["geo_bypass"], json!(true));
        assert_eq!(opts["nocheckcertificate"], json!(true));
        assert_eq!(opts["proxy"], json!("socks5://127.0.0.1:9050"));
        assert!(opts.get("cookiefile").is_none());
    }

    #[test]
    fn test_song_audio_options_extract_mp3() {
        let mode = DownloadMode::NamedSongAudio {
            format: Some("251".to_string()),
            title: Some("My Song".to_string()),
        };
        let plan = DownloadPlan::for_mode(&mode, Path::new("downloads"));
        let opts = provider().download_options(&plan);
        assert_eq!(opts["format"], json!("251"));
        assert_eq!(opts["postprocessors"][0]["preferredcodec"], json!("mp3"));
        assert_eq!(opts["postprocessors"][0]["preferredquality"], json!("192"));
        assert!(opts.get("merge_output_format").is_none());
        assert!(opts["outtmpl"].as_str().unwrap().ends_with("My_Song.%(ext)s"));
    }

    #[test]
    fn test_video_options_merge_mp4() {
        let plan = DownloadPlan::for_mode(&DownloadMode::VideoCapped720p, Path::new("downloads"));
        let opts = provider().download_options(&plan);
        assert_eq!(opts["merge_output_format"], json!("mp4"));
        assert!(opts.get("postprocessors").is_none());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_unavailable() {
        let provider =
            PythonProvider::new("no-such-python-xyz".to_string(), ResolverConfig::default());
        let err = provider.search("never gonna give you up", 1).await.unwrap_err();
        assert!(matches!(err, ResolveError::BackendUnavailable(_)));
    }

    #[cfg(unix)]
    mod download {
        use super::*;
        use crate::resolver::providers::fake_backend;
        use std::path::PathBuf;
        use tempfile::TempDir;

        const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

        /// Interpreter stand-in: logs the download flag (argv 5), creates
        /// `writes` when asked to download and prints `info`.
        fn fake_python(
            dir: &TempDir,
            info: &str,
            writes: Option<&str>,
        ) -> (PythonProvider, PathBuf) {
            let log = dir.path().join("calls.log");
            let write = writes
                .map(|name| {
                    let target = dir.path().join(name);
                    format!("[ \"$5\" = 1 ] && : > '{}'", target.display())
                })
                .unwrap_or_default();
            let body = format!(
                "echo \"$5\" >> '{}'\n{}\necho '{}'",
                log.display(),
                write,
                info
            );
            let cmd = fake_backend::script(dir.path(), "python", &body);
            (PythonProvider::new(cmd, ResolverConfig::default()), log)
        }

        #[tokio::test]
        async fn test_cached_audio_skips_download() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("dQw4w9WgXcQ.webm"), b"audio").unwrap();
            let (provider, log) =
                fake_python(&dir, r#"{"id":"dQw4w9WgXcQ","ext":"webm"}"#, None);

            let artifact = provider
                .download(URL, &DownloadMode::AudioOnly, dir.path())
                .await
                .unwrap();
            assert!(artifact.location.ends_with("dQw4w9WgXcQ.webm"));
            assert_eq!(fake_backend::log_lines(&log), vec!["0"]);
        }

        #[tokio::test]
        async fn test_named_video_returns_fresh_file() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("dQw4w9WgXcQ.mp4"), b"older video").unwrap();
            let (provider, log) =
                fake_python(&dir, fake_backend::INFO_JSON, Some("My_Song.mp4"));
            let mode = DownloadMode::NamedSongVideo {
                format: Some("137".to_string()),
                title: Some("My Song".to_string()),
            };

            let artifact = provider.download(URL, &mode, dir.path()).await.unwrap();
            assert!(artifact.location.ends_with("My_Song.mp4"));
            assert!(!artifact.is_direct_stream_url);
            assert_eq!(fake_backend::log_lines(&log), vec!["1"]);
        }

        #[tokio::test]
        async fn test_nothing_written_is_incomplete() {
            let dir = TempDir::new().unwrap();
            let (provider, log) =
                fake_python(&dir, r#"{"id":"dQw4w9WgXcQ","ext":"webm"}"#, None);

            let err = provider
                .download(URL, &DownloadMode::AudioOnly, dir.path())
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::DownloadIncomplete(_)));
            assert_eq!(fake_backend::log_lines(&log), vec!["0", "1"]);
        }
    }
}
