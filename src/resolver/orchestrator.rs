// Resolution orchestrator - priority-ordered fallback across providers
//
// Strategy:
// 1. Providers are tried strictly in registry order, one at a time
// 2. Each call runs on its own worker with a hard deadline
// 3. The first non-empty answer wins; nothing is merged across providers
//
// Every public method is total: failures end up as empty lists, `None`
// or the sentinel track, never as errors.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier;
use super::config::ResolverConfig;
use super::errors::Result;
use super::models::{DurationInfo, FormatDescriptor, MediaSummary, TrackDetails};
use super::providers::{MediaProvider, ProviderRegistry};
use super::utils::run_on_worker;

/// Results considered by `slider`
const SLIDER_RESULTS: usize = 10;

#[derive(Clone)]
pub struct Orchestrator {
    registry: ProviderRegistry,
    timeout_secs: u64,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, config: &ResolverConfig) -> Self {
        Self::with_timeout(registry, config.search_timeout_secs)
    }

    pub fn with_timeout(registry: ProviderRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout_secs: timeout_secs.max(1),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Search results from the first provider that finds anything.
    /// An empty list means "not found".
    pub async fn resolve(&self, query: &str, limit: usize) -> Vec<MediaSummary> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.max(1);

        let found = self
            .first_answer(
                "search",
                |results: &Vec<MediaSummary>| !results.is_empty(),
                move |provider| {
                    let query = query.clone();
                    async move { provider.search(&query, limit).await }
                },
            )
            .await;

        match found {
            Some(mut results) => {
                results.truncate(limit);
                results
            }
            None => Vec::new(),
        }
    }

    /// First resolved item flattened for display; sentinels when nothing resolves.
    pub async fn details(&self, link: &str) -> TrackDetails {
        self.resolve(&lookup_target(link), 1)
            .await
            .into_iter()
            .next()
            .map(TrackDetails::from)
            .unwrap_or_default()
    }

    pub async fn title(&self, link: &str) -> String {
        self.details(link).await.title
    }

    pub async fn duration(&self, link: &str) -> DurationInfo {
        let details = self.details(link).await;
        if details.duration_seconds == 0 {
            return DurationInfo::zero();
        }
        DurationInfo {
            display: details.duration_display,
            seconds: details.duration_seconds,
        }
    }

    pub async fn thumbnail(&self, link: &str) -> String {
        self.details(link).await.thumbnail
    }

    /// Details plus the video id, the pair the playback queue stores.
    pub async fn track(&self, link: &str) -> (TrackDetails, String) {
        let details = self.details(link).await;
        let video_id = details.video_id.clone();
        (details, video_id)
    }

    /// The `index`-th of the top search results, for paging through choices.
    pub async fn slider(&self, link: &str, index: usize) -> TrackDetails {
        self.resolve(&lookup_target(link), SLIDER_RESULTS)
            .await
            .into_iter()
            .nth(index)
            .map(TrackDetails::from)
            .unwrap_or_default()
    }

    /// Downloadable formats and the link they were listed for.
    pub async fn formats(&self, link: &str) -> (Vec<FormatDescriptor>, String) {
        let Some(url) = self.to_media_url(link).await else {
            return (Vec::new(), link.trim().to_string());
        };

        let target = url.clone();
        let formats = self
            .first_answer(
                "formats",
                |formats: &Vec<FormatDescriptor>| !formats.is_empty(),
                move |provider| {
                    let url = target.clone();
                    async move { provider.list_formats(&url).await }
                },
            )
            .await
            .unwrap_or_default();

        (formats, url)
    }

    /// Up to `limit` video ids of a playlist link (or bare playlist id).
    pub async fn playlist(&self, link: &str, limit: usize) -> Vec<String> {
        let target = playlist_link(link);
        let limit = limit.max(1);

        self.first_answer(
            "playlist",
            |ids: &Vec<String>| !ids.is_empty(),
            move |provider| {
                let url = target.clone();
                async move { provider.playlist_ids(&url, limit).await }
            },
        )
        .await
        .unwrap_or_default()
    }

    /// Direct progressive stream URL (≤720p) for a link or search text.
    pub async fn stream_url(&self, link: &str) -> Option<String> {
        let url = self.to_media_url(link).await?;
        self.first_answer(
            "stream",
            |stream: &String| !stream.is_empty(),
            move |provider| {
                let url = url.clone();
                async move { provider.stream_url(&url).await }
            },
        )
        .await
    }

    /// Normalized media URL for `link`, resolving free text through search.
    pub async fn to_media_url(&self, link: &str) -> Option<String> {
        if classifier::is_media_url(link) {
            return Some(classifier::normalize(link));
        }
        self.resolve(link, 1)
            .await
            .into_iter()
            .next()
            .map(|item| item.canonical_url)
            .filter(|url| !url.is_empty())
    }

    /// Runs `call` against each provider in order until one returns an
    /// accepted answer. Errors, panics and timeouts skip to the next provider.
    async fn first_answer<T, A, F, Fut>(&self, operation: &str, accept: A, call: F) -> Option<T>
    where
        T: Send + 'static,
        A: Fn(&T) -> bool,
        F: Fn(Arc<dyn MediaProvider>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        for provider in self.registry.providers() {
            let name = provider.name();
            debug!(provider = name, operation, "trying provider");

            match run_on_worker(self.timeout_secs, call(Arc::clone(provider))).await {
                Ok(answer) if accept(&answer) => {
                    info!(provider = name, operation, "provider answered");
                    return Some(answer);
                }
                Ok(_) => debug!(provider = name, operation, "provider returned nothing"),
                Err(e) => warn!(provider = name, operation, error = %e, "provider failed"),
            }
        }

        debug!(operation, "no provider answered");
        None
    }
}

/// Lookups accept URLs or search text; URLs lose tracking/playlist params.
fn lookup_target(link: &str) -> String {
    if classifier::is_media_url(link) {
        classifier::normalize(link)
    } else {
        link.trim().to_string()
    }
}

fn playlist_link(link: &str) -> String {
    let link = link.trim();
    if !link.contains("://") {
        return classifier::playlist_url(link);
    }
    // drop trailing params unless that would drop the list id itself
    match link.split_once('&') {
        Some((head, _)) if head.contains("list=") => head.to_string(),
        _ => link.to_string(),
    }
}
