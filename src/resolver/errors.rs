// Error taxonomy for providers, orchestrator and download executor

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Search yielded nothing
    #[error("No results found")]
    NotFound,

    /// Backend library/binary missing (skip, not fatal)
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend returned no parseable info for a known URL
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Post-download verification found no file
    #[error("Download incomplete: {0}")]
    DownloadIncomplete(String),

    /// Per-call bound exceeded
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Command execution failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Failed to parse backend output
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

impl From<std::io::Error> for ResolveError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            return Self::BackendUnavailable(e.to_string());
        }
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(format!("Invalid JSON: {}", e))
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(0);
        }
        Self::Http(e.to_string())
    }
}

// Classifies raw backend stderr text
impl From<String> for ResolveError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if let Some(secs) = parse_timed_out_secs(&lower) {
            return Self::Timeout(secs);
        }
        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::Timeout(0);
        }

        if lower.contains("command not found")
            || lower.contains("no such file")
            || lower.contains("no module named")
        {
            return Self::BackendUnavailable(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::Parse(s);
        }

        if lower.contains("unsupported url")
            || lower.contains("video unavailable")
            || lower.contains("is not a valid url")
            || lower.contains("private video")
        {
            return Self::ExtractionFailed(s);
        }

        Self::Execution(s)
    }
}

impl From<&str> for ResolveError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

fn parse_timed_out_secs(lower: &str) -> Option<u64> {
    let rest = lower.split("timed out after ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
