// Canonical data models shared by providers, orchestrator and executor

use serde::{Deserialize, Serialize};

use super::classifier;
use super::duration::{self, RawDuration};
use super::utils::strip_query;

pub const UNKNOWN: &str = "Unknown";

/// Canonical result of a resolution. Every field carries a total default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub title: String,
    pub video_id: String,
    pub canonical_url: String,
    pub duration_display: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub view_count: String,
}

impl Default for MediaSummary {
    fn default() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            video_id: String::new(),
            canonical_url: String::new(),
            duration_display: duration::ZERO_DISPLAY.to_string(),
            duration_seconds: 0,
            thumbnail_url: String::new(),
            channel_name: UNKNOWN.to_string(),
            view_count: "0".to_string(),
        }
    }
}

/// Backend-native record before normalization. Providers fill whatever
/// their backend exposes; `into_summary` applies the sentinels.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub title: Option<String>,
    pub id: Option<String>,
    pub url: Option<String>,
    pub duration: RawDuration,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub view_count: Option<String>,
}

impl RawRecord {
    pub fn into_summary(self) -> MediaSummary {
        let id = non_empty(self.id).unwrap_or_default();
        let canonical_url = if !id.is_empty() {
            classifier::watch_url(&id)
        } else {
            non_empty(self.url)
                .map(|u| classifier::normalize(&u))
                .unwrap_or_default()
        };
        let duration = duration::normalize(&self.duration);

        MediaSummary {
            title: non_empty(self.title).unwrap_or_else(|| UNKNOWN.to_string()),
            video_id: id,
            canonical_url,
            duration_display: duration.display,
            duration_seconds: duration.seconds,
            thumbnail_url: self
                .thumbnail
                .map(|t| strip_query(&t).to_string())
                .unwrap_or_default(),
            channel_name: non_empty(self.channel).unwrap_or_else(|| UNKNOWN.to_string()),
            view_count: non_empty(self.view_count).unwrap_or_else(|| "0".to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "None")
}

/// Normalized duration pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationInfo {
    pub display: String,
    pub seconds: u64,
}

/// Format entry surfaced by `list_formats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub format: String,
    pub format_id: String,
    pub ext: String,
    pub filesize: Option<u64>,
    pub format_note: String,
    pub resolution: String,
    /// Link the formats were listed for
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadMode {
    AudioOnly,
    VideoCapped720p,
    NamedSongAudio {
        format: Option<String>,
        title: Option<String>,
    },
    NamedSongVideo {
        format: Option<String>,
        title: Option<String>,
    },
}

impl DownloadMode {
    pub fn is_named(&self) -> bool {
        matches!(self, Self::NamedSongAudio { .. } | Self::NamedSongVideo { .. })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::NamedSongAudio { title, .. } | Self::NamedSongVideo { title, .. } => {
                title.as_deref()
            }
            _ => None,
        }
    }

    /// Returns a copy carrying `title` unless one is already set.
    pub fn with_default_title(self, fallback: &str) -> Self {
        match self {
            Self::NamedSongAudio { format, title } => Self::NamedSongAudio {
                format,
                title: title.or_else(|| Some(fallback.to_string())),
            },
            Self::NamedSongVideo { format, title } => Self::NamedSongVideo {
                format,
                title: title.or_else(|| Some(fallback.to_string())),
            },
            other => other,
        }
    }
}

/// One user request, consumed once by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_ref: String,
    pub mode: DownloadMode,
}

impl DownloadRequest {
    pub fn new(source_ref: impl Into<String>, mode: DownloadMode) -> Self {
        Self {
            source_ref: source_ref.into(),
            mode,
        }
    }

    pub fn audio(source_ref: impl Into<String>) -> Self {
        Self::new(source_ref, DownloadMode::AudioOnly)
    }

    pub fn video(source_ref: impl Into<String>) -> Self {
        Self::new(source_ref, DownloadMode::VideoCapped720p)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadArtifact {
    pub location: String,
    pub is_direct_stream_url: bool,
}

impl DownloadArtifact {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            location: path.into(),
            is_direct_stream_url: false,
        }
    }

    pub fn stream(url: impl Into<String>) -> Self {
        Self {
            location: url.into(),
            is_direct_stream_url: true,
        }
    }
}

/// Flattened view of the first resolved item, used by the bot-facing lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub title: String,
    pub link: String,
    pub video_id: String,
    pub duration_display: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
}

impl Default for TrackDetails {
    fn default() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            link: String::new(),
            video_id: String::new(),
            duration_display: duration::ZERO_DISPLAY.to_string(),
            duration_seconds: 0,
            thumbnail: String::new(),
        }
    }
}

impl From<MediaSummary> for TrackDetails {
    fn from(summary: MediaSummary) -> Self {
        let duration_seconds = if summary.duration_display == duration::ZERO_DISPLAY {
            0
        } else {
            summary.duration_seconds
        };

        Self {
            title: summary.title,
            link: summary.canonical_url,
            video_id: summary.video_id,
            duration_display: summary.duration_display,
            duration_seconds,
            thumbnail: summary.thumbnail_url,
        }
    }
}
