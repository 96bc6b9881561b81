// Shared handling for the yt-dlp family of backends
//
// The python module, the yt-dlp binary and legacy youtube-dl all emit the
// same info-dict JSON, so record parsing and download planning live here.

use serde_json::Value;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::resolver::classifier;
use crate::resolver::diagnostics::{diagnose_error, is_benign_notice};
use crate::resolver::duration::RawDuration;
use crate::resolver::errors::{ResolveError, Result};
use crate::resolver::formats::{self, MERGE_CONTAINER};
use crate::resolver::models::{DownloadMode, MediaSummary, RawRecord};
use crate::resolver::utils::{find_existing, sanitize_filename};

/// Extraction target: URLs go through unchanged, text becomes a search.
pub fn search_target(query: &str, limit: usize) -> String {
    if classifier::is_media_url(query) {
        query.trim().to_string()
    } else {
        format!("ytsearch{}:{}", limit.max(1), query.trim())
    }
}

pub fn parse_json(stdout: &[u8]) -> Result<Value> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Err(ResolveError::ExtractionFailed("backend returned no info".to_string()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Converts a failed backend run into an error, logging the diagnosed reason.
pub fn backend_failure(provider: &str, stderr: &[u8]) -> ResolveError {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if let Some(reason) = diagnose_error(&stderr) {
        warn!(
            provider,
            reason = reason.description(),
            permanent = reason.is_permanent(),
            "backend call failed"
        );
    }
    if stderr.is_empty() {
        return ResolveError::Execution(format!("{} exited without output", provider));
    }
    ResolveError::from(stderr)
}

/// Whether a run produced usable stdout despite a non-zero exit
/// (e.g. playlists with hidden unavailable videos).
pub fn tolerable_failure(output: &std::process::Output) -> bool {
    !output.stdout.is_empty() && is_benign_notice(&String::from_utf8_lossy(&output.stderr))
}

/// `--dump-json` on a search prints one object per line
pub fn parse_json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect()
}

/// Summaries from an info dict: its `entries` when it is a search/playlist
/// result, the dict itself otherwise. Entries without an id are dropped.
pub fn summaries_from_info(info: &Value, limit: usize) -> Vec<MediaSummary> {
    let entries: Vec<&Value> = match info.get("entries").and_then(Value::as_array) {
        Some(entries) => entries.iter().collect(),
        None => vec![info],
    };

    entries
        .into_iter()
        .filter(|entry| entry.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty()))
        .take(limit)
        .map(|entry| record_from_entry(entry).into_summary())
        .collect()
}

pub fn record_from_entry(entry: &Value) -> RawRecord {
    let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

    // flat entries carry a thumbnails array instead of a thumbnail string
    let thumbnail = text("thumbnail").or_else(|| {
        entry
            .get("thumbnails")
            .and_then(Value::as_array)
            .and_then(|thumbs| thumbs.last())
            .and_then(|t| t.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let view_count = match entry.get("view_count") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    RawRecord {
        title: text("title"),
        id: text("id"),
        url: text("webpage_url").or_else(|| text("url")),
        duration: entry.get("duration").map(RawDuration::from).unwrap_or_default(),
        thumbnail,
        channel: text("uploader").or_else(|| text("channel")),
        view_count,
    }
}

/// Ids from a flat playlist dump or `--get-id` output, keeping only
/// well-formed 11-character ids.
pub fn playlist_ids_from_lines(stdout: &[u8], limit: usize) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|id| id.len() == 11)
        .take(limit)
        .map(str::to_string)
        .collect()
}

pub fn playlist_ids_from_info(info: &Value, limit: usize) -> Vec<String> {
    info.get("entries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("id").and_then(Value::as_str))
                .filter(|id| id.len() == 11)
                .take(limit)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Everything a backend needs to perform one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub format: String,
    /// Backend output template (`%(id)s` / `%(ext)s` placeholders)
    pub output_template: String,
    /// File stem for title-based downloads; id-based plans learn theirs
    /// from the backend info
    pub named_stem: Option<String>,
    pub extract_mp3: bool,
    pub merge_mp4: bool,
    pub extensions: &'static [&'static str],
}

impl DownloadPlan {
    pub fn for_mode(mode: &DownloadMode, dir: &Path) -> Self {
        let named_stem = mode
            .is_named()
            .then(|| sanitize_filename(mode.title().unwrap_or_default()));
        let stem = named_stem.as_deref().unwrap_or("%(id)s");

        Self {
            format: formats::format_spec(mode),
            output_template: dir.join(format!("{}.%(ext)s", stem)).to_string_lossy().to_string(),
            extract_mp3: matches!(mode, DownloadMode::NamedSongAudio { .. }),
            merge_mp4: matches!(
                mode,
                DownloadMode::VideoCapped720p | DownloadMode::NamedSongVideo { .. }
            ),
            extensions: formats::expected_extensions(mode),
            named_stem,
        }
    }

    pub fn is_id_based(&self) -> bool {
        self.named_stem.is_none()
    }

    /// Existing artifact for this plan, given the backend-native id.
    pub fn locate(&self, dir: &Path, video_id: Option<&str>) -> Option<PathBuf> {
        let stem = self.named_stem.as_deref().or(video_id)?;
        find_existing(dir, stem, self.extensions)
    }

    /// Like `locate`, but tries the extension the backend reported first.
    /// Title-named plans only ever look for their own stem.
    pub fn locate_with_ext(
        &self,
        dir: &Path,
        video_id: &str,
        ext: Option<&str>,
    ) -> Option<PathBuf> {
        if self.named_stem.is_some() {
            return self.locate(dir, None);
        }
        if let Some(ext) = ext.filter(|e| !e.is_empty()) {
            let preferred = dir.join(format!("{}.{}", video_id, ext));
            if preferred.is_file() {
                return Some(preferred);
            }
        }
        self.locate(dir, Some(video_id))
    }

    pub fn merge_container(&self) -> Option<&'static str> {
        self.merge_mp4.then_some(MERGE_CONTAINER)
    }
}

/// `(id, ext)` of a deep-extracted info dict
pub fn id_and_ext(info: &Value) -> Option<(String, Option<String>)> {
    let id = info.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
    let ext = info.get("ext").and_then(Value::as_str).map(str::to_string);
    Some((id.to_string(), ext))
}
