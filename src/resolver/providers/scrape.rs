// Page-scraping provider - last resort when no extractor is installed
//
// Text queries read the search results page's embedded `ytInitialData`;
// direct URLs go through the oEmbed endpoint. Search only: no formats,
// downloads or stream URLs.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::MediaProvider;
use crate::resolver::classifier;
use crate::resolver::config::ResolverConfig;
use crate::resolver::duration::RawDuration;
use crate::resolver::errors::{ResolveError, Result};
use crate::resolver::models::{MediaSummary, RawRecord};

const RESULTS_URL: &str = "https://www.youtube.com/results";
const OEMBED_URL: &str = "https://www.youtube.com/oembed";

lazy_static! {
    static ref INITIAL_DATA: Regex =
        Regex::new(r"(?s)var ytInitialData\s*=\s*(\{.*?\});\s*</script>").unwrap();
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}

pub struct ScrapeProvider {
    client: reqwest::Client,
}

impl ScrapeProvider {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.search_timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(!config.check_certificate);

        if let Some(proxy) = config.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn search_page(&self, query: &str, limit: usize) -> Result<Vec<MediaSummary>> {
        let html = self
            .client
            .get(RESULTS_URL)
            .query(&[("search_query", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let data = initial_data(&html)?;
        Ok(video_renderers(&data)
            .into_iter()
            .filter_map(record_from_renderer)
            .take(limit)
            .map(RawRecord::into_summary)
            .collect())
    }

    async fn oembed(&self, url: &str) -> Result<Vec<MediaSummary>> {
        let url = classifier::normalize(url);
        let video_id = classifier::extract_id(&url);

        let embed: OEmbed = self
            .client
            .get(OEMBED_URL)
            .query(&[("url", url.as_str()), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let record = RawRecord {
            title: embed.title,
            id: Some(video_id).filter(|id| !id.is_empty()),
            url: Some(url),
            duration: RawDuration::Absent,
            thumbnail: embed.thumbnail_url,
            channel: embed.author_name,
            view_count: None,
        };
        Ok(vec![record.into_summary()])
    }
}

#[async_trait]
impl MediaProvider for ScrapeProvider {
    fn name(&self) -> &'static str {
        "web-scrape"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaSummary>> {
        debug!(provider = self.name(), query, "scraping");
        if classifier::is_media_url(query) {
            self.oembed(query).await
        } else {
            self.search_page(query.trim(), limit).await
        }
    }
}

fn initial_data(html: &str) -> Result<Value> {
    let json = INITIAL_DATA
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            ResolveError::ExtractionFailed("ytInitialData not found in page".to_string())
        })?;
    Ok(serde_json::from_str(json.as_str())?)
}

/// Every `videoRenderer` object in document order
fn video_renderers(data: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    collect_renderers(data, &mut found);
    found
}

fn collect_renderers<'a>(value: &'a Value, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "videoRenderer" {
                    found.push(child);
                } else {
                    collect_renderers(child, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_renderers(item, found);
            }
        }
        _ => {}
    }
}

fn record_from_renderer(renderer: &Value) -> Option<RawRecord> {
    let id = renderer["videoId"].as_str().filter(|id| !id.is_empty())?;
    let text = |value: &Value| value.as_str().map(str::to_string);

    Some(RawRecord {
        title: text(&renderer["title"]["runs"][0]["text"]),
        id: Some(id.to_string()),
        url: None,
        duration: renderer["lengthText"]["simpleText"]
            .as_str()
            .map(RawDuration::from)
            .unwrap_or_default(),
        thumbnail: renderer["thumbnail"]["thumbnails"]
            .as_array()
            .and_then(|thumbs| thumbs.last())
            .and_then(|t| text(&t["url"])),
        channel: text(&renderer["ownerText"]["runs"][0]["text"]),
        view_count: text(&renderer["viewCountText"]["simpleText"]),
    })
}
