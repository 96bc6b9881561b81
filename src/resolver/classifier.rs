// URL classification and normalization. Pure string work, no network.

use lazy_static::lazy_static;
use regex::Regex;

pub const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";
pub const PLAYLIST_BASE: &str = "https://youtube.com/playlist?list=";

lazy_static! {
    static ref MEDIA_URL_PATTERNS: Vec<Regex> = [
        r"(?:youtube\.com|youtu\.be)",
        r"youtube\.com/watch\?v=",
        r"youtu\.be/",
        r"youtube\.com/embed/",
        r"youtube\.com/v/",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();

    // Query-param form, embed-path form, short-domain form
    static ref ID_PATTERNS: Vec<Regex> = [
        r"(?:v=|/)([0-9A-Za-z_-]{11})",
        r"(?:embed/)([0-9A-Za-z_-]{11})",
        r"(?:youtu\.be/)([0-9A-Za-z_-]{11})",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
}

/// Whether `text` points at the media platform rather than being a search query.
pub fn is_media_url(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    MEDIA_URL_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Drops everything after the first `&`, then any `?list=` playlist context.
pub fn normalize(url: &str) -> String {
    let url = url.split('&').next().unwrap_or(url);
    let url = url.split("?list=").next().unwrap_or(url);
    url.trim().to_string()
}

/// First 11-character identifier found in `url`, or an empty string.
pub fn extract_id(url: &str) -> String {
    ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_BASE, video_id)
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("{}{}", PLAYLIST_BASE, playlist_id)
}

/// Callers may hand over a bare id instead of a link.
pub fn with_video_id(link: &str, is_id: bool) -> String {
    if is_id {
        watch_url(link)
    } else {
        link.to_string()
    }
}

pub fn exists(link: &str, is_id: bool) -> bool {
    is_media_url(&with_video_id(link, is_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url_detection() {
        assert!(is_media_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_media_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_media_url("  https://youtube.com/embed/dQw4w9WgXcQ  "));
        assert!(is_media_url("https://m.youtube.com/v/dQw4w9WgXcQ"));
        assert!(!is_media_url("never gonna give you up"));
        assert!(!is_media_url("https://vimeo.com/12345"));
        assert!(!is_media_url(""));
        assert!(!is_media_url("   \t"));
    }

    #[test]
    fn test_normalize_strips_playlist_and_params() {
        assert_eq!(
            normalize("https://youtu.be/abc123XYZ_-?list=PL1&t=30"),
            "https://youtu.be/abc123XYZ_-"
        );
        assert_eq!(
            normalize("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1&index=2"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(normalize("  https://youtu.be/x  "), "https://youtu.be/x");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for url in [
            "https://youtu.be/abc123XYZ_-?list=PL1&t=30",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s",
            "https://www.youtube.com/playlist?list=PLxyz",
            "plain text",
            "",
        ] {
            let once = normalize(url);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_extract_id() {
        assert_eq!(
            extract_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=5"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_id("https://youtu.be/abc123XYZ_-"), "abc123XYZ_-");
        assert_eq!(
            extract_id("https://www.youtube.com/embed/dQw4w9WgXcQ?start=3"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_id("lofi beats"), "");
        assert_eq!(extract_id("https://youtu.be/short"), "");
    }

    #[test]
    fn test_bare_id_prefixing() {
        assert_eq!(
            with_video_id("dQw4w9WgXcQ", true),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(with_video_id("query", false), "query");
        assert!(exists("dQw4w9WgXcQ", true));
        assert!(!exists("dQw4w9WgXcQ", false));
        assert_eq!(playlist_url("PL1"), "https://youtube.com/playlist?list=PL1");
    }
}
