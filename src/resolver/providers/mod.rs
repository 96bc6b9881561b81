// Provider adapters - one per extraction backend
//
// Every backend speaks its own data shape; adapters convert into
// `MediaSummary` / `FormatDescriptor` / `DownloadArtifact`. Selection and
// fallback live in the orchestrator and executor, never here.

mod cli;
mod python;
mod scrape;
mod ytdl;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::config::ResolverConfig;
use super::errors::{ResolveError, Result};
use super::models::{DownloadArtifact, DownloadMode, FormatDescriptor, MediaSummary};
use super::tools::{ToolInfo, ToolManager, ToolType};

pub use cli::{ExecutableFlavor, ExecutableProvider};
pub use python::PythonProvider;
pub use scrape::ScrapeProvider;
pub use ytdl::DownloadPlan;

#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Direct URL → at most one item; free text → backend-ranked results
    /// truncated to `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaSummary>>;

    async fn list_formats(&self, _url: &str) -> Result<Vec<FormatDescriptor>> {
        Err(self.unsupported("format listing"))
    }

    /// Fetch `url` into `dir` according to `mode`.
    async fn download(
        &self,
        _url: &str,
        _mode: &DownloadMode,
        _dir: &Path,
    ) -> Result<DownloadArtifact> {
        Err(self.unsupported("downloads"))
    }

    /// Direct progressive stream URL (≤720p), no local copy.
    async fn stream_url(&self, _url: &str) -> Result<String> {
        Err(self.unsupported("stream URLs"))
    }

    /// Video ids of a playlist, at most `limit`.
    async fn playlist_ids(&self, _url: &str, _limit: usize) -> Result<Vec<String>> {
        Err(self.unsupported("playlists"))
    }

    fn unsupported(&self, what: &str) -> ResolveError {
        ResolveError::BackendUnavailable(format!("{} does not support {}", self.name(), what))
    }
}

/// Immutable, ordered list of available providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MediaProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn MediaProvider>>) -> Self {
        Self { providers }
    }

    /// Detects installed backends once and builds the priority list:
    /// python yt_dlp → yt-dlp → youtube-dl → page scraping.
    pub async fn detect(config: &ResolverConfig) -> Self {
        let detect_config = config.clone();
        let tools = tokio::task::spawn_blocking(move || detect_tools(&detect_config))
            .await
            .unwrap_or_default();

        let mut providers: Vec<Arc<dyn MediaProvider>> = Vec::new();

        for tool in tools.into_iter().filter(|t| t.is_available) {
            let Some(path) = tool.path.clone() else {
                continue;
            };
            info!(
                tool = tool.name.as_str(),
                version = tool.version.as_deref().unwrap_or("?"),
                path = path.as_str(),
                "backend available"
            );
            match tool.tool_type {
                ToolType::PythonYtDlp => {
                    providers.push(Arc::new(PythonProvider::new(path, config.clone())))
                }
                ToolType::YtDlp => providers.push(Arc::new(ExecutableProvider::new(
                    ExecutableFlavor::YtDlp,
                    path,
                    config.clone(),
                ))),
                ToolType::YoutubeDl => providers.push(Arc::new(ExecutableProvider::new(
                    ExecutableFlavor::YoutubeDl,
                    path,
                    config.clone(),
                ))),
            }
        }

        match ScrapeProvider::new(config) {
            Ok(scrape) => providers.push(Arc::new(scrape)),
            Err(e) => tracing::warn!(error = %e, "page scraping backend disabled"),
        }

        let registry = Self::new(providers);
        info!(providers = ?registry.names(), "provider priority fixed");
        registry
    }

    pub fn providers(&self) -> &[Arc<dyn MediaProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn detect_tools(config: &ResolverConfig) -> Vec<ToolInfo> {
    let manager = ToolManager::new(config.python_cmd.clone());

    let binary = |tool_type: ToolType, configured: &Option<String>| match configured {
        Some(path) => manager.check_path(tool_type, path),
        None => manager.get_tool_info(tool_type),
    };

    vec![
        manager.get_tool_info(ToolType::PythonYtDlp),
        binary(ToolType::YtDlp, &config.ytdlp_path),
        binary(ToolType::YoutubeDl, &config.youtube_dl_path),
    ]
}
