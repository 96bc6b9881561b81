pub mod resolver;

pub use resolver::{
    extract_media_url, ChatMessage, DownloadArtifact, DownloadExecutor, DownloadMode,
    DownloadRequest, DownloadState, FeatureFlags, MediaProvider, MediaSummary, Orchestrator,
    ProviderRegistry, ResolveError, ResolverConfig, StaticFlags, TrackDetails,
};

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber honouring `RUST_LOG` (default `media_resolver=info`).
/// Does nothing if the host already installed one.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_resolver=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Detects installed backends and wires the orchestrator and executor
/// sharing one provider registry.
pub async fn build(
    config: ResolverConfig,
    flags: std::sync::Arc<dyn FeatureFlags>,
) -> (Orchestrator, DownloadExecutor) {
    let registry = ProviderRegistry::detect(&config).await;
    let orchestrator = Orchestrator::new(registry, &config);
    let executor = DownloadExecutor::new(orchestrator.clone(), flags, config);
    (orchestrator, executor)
}
