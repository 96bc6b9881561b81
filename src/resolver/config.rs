// Resolver configuration, materialized by the host process

use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Shared on-disk download directory
    pub downloads_dir: PathBuf,
    /// Socket timeout handed to the backend, in seconds
    pub socket_timeout_secs: u32,
    /// Resource-fetch retries internal to the backend
    pub retries: u32,
    /// Hard bound for one search/metadata call
    pub search_timeout_secs: u64,
    /// Hard bound for one download call
    pub download_timeout_secs: u64,
    /// Python interpreter used for the in-process yt_dlp backend
    pub python_cmd: String,
    /// Explicit yt-dlp binary; auto-detected when unset
    pub ytdlp_path: Option<String>,
    /// Explicit youtube-dl binary; auto-detected when unset
    pub youtube_dl_path: Option<String>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    pub user_agent: String,
    pub geo_bypass: bool,
    pub check_certificate: bool,
    /// Feature flag consulted for 720p video: enabled means direct stream URL,
    /// disabled means a local merged mp4. Hosts migrating an on/off switch
    /// where "on" meant local download must invert it when seeding the store.
    pub direct_stream_flag: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            socket_timeout_secs: 30,
            retries: 3,
            search_timeout_secs: 30,
            download_timeout_secs: 600,
            python_cmd: "python3".to_string(),
            ytdlp_path: None,
            youtube_dl_path: None,
            proxy: None,
            cookies_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            geo_bypass: true,
            check_certificate: false,
            direct_stream_flag: 1,
        }
    }
}

impl ResolverConfig {
    /// Defaults overlaid with `MEDIA_RESOLVER_*` environment variables.
    /// `YTDLP_PYTHON` selects the interpreter (e.g. a venv python).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("MEDIA_RESOLVER_DOWNLOADS_DIR") {
            config.downloads_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("MEDIA_RESOLVER_SOCKET_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.socket_timeout_secs = secs;
        }
        if let Some(retries) = lookup("MEDIA_RESOLVER_RETRIES").and_then(|v| v.parse().ok()) {
            config.retries = retries;
        }
        if let Some(secs) = lookup("MEDIA_RESOLVER_SEARCH_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.search_timeout_secs = secs;
        }
        if let Some(secs) = lookup("MEDIA_RESOLVER_DOWNLOAD_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.download_timeout_secs = secs;
        }
        if let Some(python) = lookup("YTDLP_PYTHON") {
            config.python_cmd = python;
        }
        config.ytdlp_path = lookup("MEDIA_RESOLVER_YTDLP").or(config.ytdlp_path);
        config.youtube_dl_path = lookup("MEDIA_RESOLVER_YOUTUBE_DL").or(config.youtube_dl_path);
        config.proxy = lookup("MEDIA_RESOLVER_PROXY").or(config.proxy);
        config.cookies_path = lookup("MEDIA_RESOLVER_COOKIES").or(config.cookies_path);
        if let Some(flag) = lookup("MEDIA_RESOLVER_DIRECT_STREAM_FLAG").and_then(|v| v.parse().ok())
        {
            config.direct_stream_flag = flag;
        }

        config
    }

    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_search_timeout(mut self, seconds: u64) -> Self {
        self.search_timeout_secs = seconds;
        self
    }

    pub fn with_download_timeout(mut self, seconds: u64) -> Self {
        self.download_timeout_secs = seconds;
        self
    }

    pub fn with_python_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.python_cmd = cmd.into();
        self
    }

    /// Creates the downloads directory if absent.
    pub fn ensure_downloads_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.downloads_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(config.socket_timeout_secs, 30);
        assert_eq!(config.retries, 3);
        assert!(config.geo_bypass);
        assert!(!config.check_certificate);
        assert_eq!(config.direct_stream_flag, 1);
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("MEDIA_RESOLVER_DOWNLOADS_DIR", "/tmp/dl"),
            ("MEDIA_RESOLVER_SOCKET_TIMEOUT", "15"),
            ("MEDIA_RESOLVER_RETRIES", "not-a-number"),
            ("YTDLP_PYTHON", "/venv/bin/python"),
            ("MEDIA_RESOLVER_PROXY", "socks5://127.0.0.1:1080"),
        ]
        .into_iter()
        .collect();

        let config = ResolverConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.downloads_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.socket_timeout_secs, 15);
        assert_eq!(config.retries, 3);
        assert_eq!(config.python_cmd, "/venv/bin/python");
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn test_direct_stream_flag_override() {
        let config = ResolverConfig::from_lookup(|k| {
            (k == "MEDIA_RESOLVER_DIRECT_STREAM_FLAG").then(|| "7".to_string())
        });
        assert_eq!(config.direct_stream_flag, 7);

        let config = ResolverConfig::from_lookup(|k| {
            (k == "MEDIA_RESOLVER_DIRECT_STREAM_FLAG").then(|| "off".to_string())
        });
        assert_eq!(config.direct_stream_flag, 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"downloads_dir": "media", "retries": 5}"#).unwrap();
        assert_eq!(config.downloads_dir, PathBuf::from("media"));
        assert_eq!(config.retries, 5);
        assert_eq!(config.search_timeout_secs, 30);
    }
}
