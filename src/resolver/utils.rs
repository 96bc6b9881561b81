// Helper functions shared by providers and the executor

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use super::errors::{ResolveError, Result};

const MAX_FILENAME_CHARS: usize = 100;

lazy_static! {
    static ref FORBIDDEN_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
    static ref SEPARATOR_RUNS: Regex = Regex::new(r"[\s\-]+").unwrap();
}

/// Run command with timeout, capturing stdout and stderr.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output> {
    debug!(program, args = %args.join(" "), "spawning backend process");

    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ResolveError::BackendUnavailable(format!("{}: {}", program, e))
            }
            _ => ResolveError::Execution(format!("Failed to start {}: {}", program, e)),
        })?;

    let capture_failed = |pipe: &str| {
        ResolveError::Execution(format!("Failed to capture {} from {}", pipe, program))
    };
    let mut stdout_pipe = child.stdout.take().ok_or_else(|| capture_failed("stdout"))?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| capture_failed("stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status.map_err(ResolveError::from)?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(ResolveError::Timeout(timeout_secs))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>> {
    task.await
        .map_err(|e| ResolveError::Execution(format!("pipe reader failed: {}", e)))?
        .map_err(ResolveError::from)
}

/// Runs `fut` as its own task with a deadline. Panics and elapsed
/// deadlines come back as errors instead of unwinding into the caller.
pub async fn run_on_worker<T, F>(timeout_secs: u64, fut: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    let abort = handle.abort_handle();

    match timeout(Duration::from_secs(timeout_secs), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ResolveError::Execution(format!(
            "worker task failed: {}",
            join_err
        ))),
        Err(_) => {
            abort.abort();
            Err(ResolveError::Timeout(timeout_secs))
        }
    }
}

/// Filesystem-safe name derived from a media title.
pub fn sanitize_filename(name: &str) -> String {
    let stripped = FORBIDDEN_CHARS.replace_all(name, "");
    let joined = SEPARATOR_RUNS.replace_all(&stripped, "_");
    let truncated: String = joined.chars().take(MAX_FILENAME_CHARS).collect();

    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated
    }
}

/// Drops any trailing query string.
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// First non-empty line of backend stdout.
pub fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// First `dir/<stem>.<ext>` that exists on disk.
pub fn find_existing(dir: &Path, stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_forbidden_and_joins_runs() {
        let name = sanitize_filename("My: Song / Title??");
        assert_eq!(name, "My_Song_Title");
        assert!(!name.chars().any(|c| "<>:\"/\\|?*".contains(c)));
    }

    #[test]
    fn test_sanitize_hyphen_runs_and_length() {
        assert_eq!(sanitize_filename("Artist - Track -- Live"), "Artist_Track_Live");
        let long = "x".repeat(250);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[test]
    fn test_sanitize_never_empty() {
        assert_eq!(sanitize_filename(""), "unknown");
        assert_eq!(sanitize_filename("???***"), "unknown");
    }

    #[test]
    fn test_strip_query_and_first_line() {
        assert_eq!(strip_query("https://i.ytimg.com/a.jpg?x=1"), "https://i.ytimg.com/a.jpg");
        assert_eq!(strip_query("https://i.ytimg.com/a.jpg"), "https://i.ytimg.com/a.jpg");
        assert_eq!(
            first_line(b"\nhttps://cdn/1\nhttps://cdn/2\n"),
            Some("https://cdn/1".to_string())
        );
        assert_eq!(first_line(b"  \n"), None);
    }

    #[test]
    fn test_find_existing_prefers_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.m4a"), b"a").unwrap();
        std::fs::write(dir.path().join("abc.webm"), b"w").unwrap();

        let found = find_existing(dir.path(), "abc", &["webm", "m4a"]).unwrap();
        assert!(found.ends_with("abc.webm"));
        assert!(find_existing(dir.path(), "zzz", &["webm"]).is_none());
    }

    #[tokio::test]
    async fn test_worker_converts_panic_and_timeout() {
        let panicked = run_on_worker::<(), _>(5, async {
            if true {
                panic!("boom");
            }
            Ok(())
        })
        .await;
        assert!(matches!(panicked, Err(ResolveError::Execution(_))));

        let slow = run_on_worker::<(), _>(1, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(slow, Err(ResolveError::Timeout(1)));

        let ok = run_on_worker(5, async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn test_missing_program_is_backend_unavailable() {
        let result =
            run_output_with_timeout("definitely-not-a-real-binary-xyz", &[], 5).await;
        assert!(matches!(result, Err(ResolveError::BackendUnavailable(_))));
    }
}
