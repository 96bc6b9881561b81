// Format selection
//
// Maps download modes to backend format selectors and filters raw format
// listings down to entries a user can pick from.

use serde_json::Value;

use super::models::{DownloadMode, FormatDescriptor};

/// Best audio-only stream, falling back to best muxed
pub const AUDIO_ONLY_SPEC: &str = "bestaudio/best";

/// Merged ≤720p mp4 video with m4a audio
pub const VIDEO_720_SPEC: &str =
    "(bestvideo[height<=?720][width<=?1280][ext=mp4])+(bestaudio[ext=m4a])/best[height<=?720]";

/// Single progressive stream ≤720p, playable without a merge step
pub const STREAM_720_SPEC: &str = "best[height<=?720][width<=?1280]";

/// Companion audio track merged into user-picked video formats (m4a 128k)
pub const COMPANION_AUDIO_ID: &str = "140";

pub const SONG_AUDIO_CODEC: &str = "mp3";
pub const SONG_AUDIO_QUALITY: &str = "192";

pub const MERGE_CONTAINER: &str = "mp4";

/// Extensions tried when locating an audio download, in preference order.
/// mp4 is left out: `<id>.mp4` is what a 720p video download leaves behind.
/// An audio fallback that lands in mp4 is still found through the extension
/// the backend reports.
pub const AUDIO_EXTENSIONS: &[&str] = &["webm", "m4a", "opus", "mp3"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Backend format selector for a download mode
pub fn format_spec(mode: &DownloadMode) -> String {
    match mode {
        DownloadMode::AudioOnly => AUDIO_ONLY_SPEC.to_string(),
        DownloadMode::VideoCapped720p => VIDEO_720_SPEC.to_string(),
        DownloadMode::NamedSongAudio { format, .. } => format
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or(AUDIO_ONLY_SPEC)
            .to_string(),
        DownloadMode::NamedSongVideo { format, .. } => match format.as_deref() {
            Some(f) if !f.is_empty() => format!("{}+{}", f, COMPANION_AUDIO_ID),
            _ => "best".to_string(),
        },
    }
}

/// Extensions the finished artifact may carry
pub fn expected_extensions(mode: &DownloadMode) -> &'static [&'static str] {
    match mode {
        DownloadMode::AudioOnly => AUDIO_EXTENSIONS,
        DownloadMode::VideoCapped720p => VIDEO_EXTENSIONS,
        DownloadMode::NamedSongAudio { .. } => &["mp3"],
        DownloadMode::NamedSongVideo { .. } => &["mp4"],
    }
}

/// Surfaces only complete, non-DASH formats from a raw `formats` array.
pub fn filter_formats(raw_formats: &[Value], source_url: &str) -> Vec<FormatDescriptor> {
    raw_formats
        .iter()
        .filter_map(|f| {
            let format = f.get("format")?.as_str()?;
            let format_id = json_text(f.get("format_id")?)?;
            let ext = f.get("ext")?.as_str()?;

            if format.to_lowercase().contains("dash") {
                return None;
            }

            Some(FormatDescriptor {
                format: format.to_string(),
                format_id,
                ext: ext.to_string(),
                filesize: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
                format_note: f["format_note"].as_str().unwrap_or("").to_string(),
                resolution: f["resolution"].as_str().unwrap_or("Unknown").to_string(),
                source_url: source_url.to_string(),
            })
        })
        .collect()
}

// format_id is usually a string, but some extractors emit integers (itags)
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_spec_per_mode() {
        assert_eq!(format_spec(&DownloadMode::AudioOnly), "bestaudio/best");
        assert!(format_spec(&DownloadMode::VideoCapped720p).contains("height<=?720"));
        assert_eq!(
            format_spec(&DownloadMode::NamedSongAudio {
                format: Some("251".to_string()),
                title: None
            }),
            "251"
        );
        assert_eq!(
            format_spec(&DownloadMode::NamedSongAudio {
                format: None,
                title: None
            }),
            "bestaudio/best"
        );
        assert_eq!(
            format_spec(&DownloadMode::NamedSongVideo {
                format: Some("136".to_string()),
                title: None
            }),
            "136+140"
        );
        assert_eq!(
            format_spec(&DownloadMode::NamedSongVideo {
                format: None,
                title: None
            }),
            "best"
        );
    }

    #[test]
    fn test_audio_and_video_extensions_are_disjoint() {
        let audio = expected_extensions(&DownloadMode::AudioOnly);
        let video = expected_extensions(&DownloadMode::VideoCapped720p);
        assert!(audio.iter().all(|ext| !video.contains(ext)));
        assert_eq!(audio[0], "webm");
    }

    #[test]
    fn test_filter_drops_dash_and_incomplete() {
        let raw = vec![
            json!({"format": "18 - 640x360 (360p)", "format_id": "18", "ext": "mp4",
                   "filesize": 1000, "format_note": "360p", "resolution": "640x360"}),
            json!({"format": "137 - 1920x1080 (DASH video)", "format_id": "137", "ext": "mp4"}),
            json!({"format": "140 - audio only", "format_id": "140"}),
            json!({"format_id": "251", "ext": "webm"}),
            json!({"format": "22 - 1280x720", "format_id": 22, "ext": "mp4"}),
        ];

        let formats = filter_formats(&raw, "https://youtu.be/x");
        let ids: Vec<&str> = formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["18", "22"]);
        assert_eq!(formats[0].filesize, Some(1000));
        assert_eq!(formats[1].resolution, "Unknown");
        assert_eq!(formats[1].source_url, "https://youtu.be/x");
    }
}
