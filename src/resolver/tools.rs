// Capability detection for extraction backends
//
// Probing spawns short blocking processes, so it runs once at startup
// (see `ProviderRegistry::detect`) and is never re-evaluated mid-run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    YoutubeDl,
    /// `yt_dlp` importable from the configured Python interpreter
    PythonYtDlp,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::YoutubeDl => "youtube-dl",
            ToolType::PythonYtDlp => "python-yt_dlp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    python_cmd: String,
}

impl ToolManager {
    pub fn new(python_cmd: impl Into<String>) -> Self {
        Self {
            python_cmd: python_cmd.into(),
        }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let (path, version) = match tool_type {
            ToolType::PythonYtDlp => self.detect_python_module(),
            ToolType::YtDlp | ToolType::YoutubeDl => self.detect_binary(tool_type.as_str()),
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: path.is_some(),
            version,
            path,
        }
    }

    /// Info for an explicitly configured binary; only the version check runs.
    pub fn check_path(&self, tool_type: ToolType, path: &str) -> ToolInfo {
        let version = Self::get_version(path);
        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: version.is_some(),
            path: version.as_ref().map(|_| path.to_string()),
            version,
        }
    }

    fn detect_binary(&self, binary_name: &str) -> (Option<String>, Option<String>) {
        // 1. Common install locations, including pip --user
        let mut candidates: Vec<PathBuf> = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
            .iter()
            .map(|dir| PathBuf::from(dir).join(binary_name))
            .collect();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".local/bin").join(binary_name));
        }

        for path in candidates {
            if path.exists() {
                let path = path.to_string_lossy().to_string();
                if let Some(version) = Self::get_version(&path) {
                    return (Some(path), Some(version));
                }
            }
        }

        // 2. PATH lookup
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    let version = Self::get_version(&path);
                    if version.is_some() {
                        return (Some(path), version);
                    }
                }
            }
        }

        (None, None)
    }

    fn detect_python_module(&self) -> (Option<String>, Option<String>) {
        let code = "import yt_dlp; print(yt_dlp.version.__version__)";
        match Command::new(&self.python_cmd).args(["-c", code]).output() {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (Some(self.python_cmd.clone()), Some(version))
            }
            _ => (None, None),
        }
    }

    fn get_version(path: &str) -> Option<String> {
        match Command::new(path).arg("--version").output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            _ => None,
        }
    }
}
