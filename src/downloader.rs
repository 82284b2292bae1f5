use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::types::ParsedIdentity;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("\"{url}\" is not a usable http(s) url: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("cannot spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{tool} timed out after {}s", timeout.as_secs())]
    TimedOut {
        tool: &'static str,
        timeout: Duration,
    },
    #[error("{tool} failed: {stderr}")]
    ToolFailed {
        tool: &'static str,
        stderr: String,
    },
    #[error("yt-dlp produced no audio file for \"{0}\"")]
    NoOutput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What to do when the target file name already exists in the output
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    Overwrite,
    Suffix,
}

pub trait MediaDownloader: Send + Sync {
    /// Download `url` and produce an mp3 named after `identity` in the
    /// output directory.
    fn download(&self, url: &str, identity: &ParsedIdentity) -> Result<PathBuf, DownloadError>;
}

/// Downloads the best audio stream with yt-dlp, then transcodes it to mp3
/// with ffmpeg. Both subprocesses are killed when they outlive the timeout.
pub struct YtDlpDownloader {
    output_dir: PathBuf,
    timeout: Duration,
    on_collision: CollisionPolicy,
}

impl YtDlpDownloader {
    pub fn new(output_dir: PathBuf, timeout: Duration, on_collision: CollisionPolicy) -> Self {
        YtDlpDownloader {
            output_dir,
            timeout,
            on_collision,
        }
    }

    fn target_path(&self, stem: &str) -> Result<PathBuf, DownloadError> {
        let direct = self.output_dir.join(format!("{stem}.mp3"));

        match self.on_collision {
            CollisionPolicy::Overwrite => Ok(direct),
            CollisionPolicy::Suffix => {
                // Reserve the name by creating the file; a plain exists()
                // check would let two workers with the same stem pick the
                // same candidate.
                if reserve(&direct)? {
                    return Ok(direct);
                }

                let mut n = 1;
                loop {
                    let candidate = self.output_dir.join(format!("{stem} ({n}).mp3"));
                    if reserve(&candidate)? {
                        return Ok(candidate);
                    }
                    n += 1;
                }
            }
        }
    }

    fn find_download(&self, stem_prefix: &str) -> Result<Option<PathBuf>, DownloadError> {
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name();

            if name.to_string_lossy().starts_with(stem_prefix) {
                return Ok(Some(entry.path()));
            }
        }

        Ok(None)
    }
}

impl MediaDownloader for YtDlpDownloader {
    fn download(&self, url: &str, identity: &ParsedIdentity) -> Result<PathBuf, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::BadUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(DownloadError::BadUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
            });
        }

        let stem = sanitize_stem(&format!("{} - {}", identity.artist, identity.title));
        let target = self.target_path(&stem)?;
        let target_stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(stem);

        // yt-dlp picks the container, so the intermediate keeps a wildcard
        // extension and is located again afterwards.
        let source_prefix = format!("{target_stem}.source.");
        let template = format!(
            "{}/{}%(ext)s",
            self.output_dir.display(),
            source_prefix
        );

        let mut yt_dlp = Command::new("yt-dlp");
        yt_dlp
            .args(["-f", "bestaudio", "-x", "--no-warnings", "--no-playlist"])
            .arg("-o")
            .arg(&template)
            .arg("--")
            .arg(url);

        run_with_timeout(yt_dlp, "yt-dlp", self.timeout)?;

        let intermediate = self
            .find_download(&source_prefix)?
            .ok_or_else(|| DownloadError::NoOutput(url.to_string()))?;

        debug!(
            "transcoding \"{}\" to \"{}\"",
            intermediate.display(),
            target.display()
        );

        let mut ffmpeg = Command::new("ffmpeg");
        ffmpeg
            .arg("-i")
            .arg(&intermediate)
            .args(["-vn", "-ar", "44100", "-b:a", "192k", "-y"])
            .arg(&target);

        let transcode = run_with_timeout(ffmpeg, "ffmpeg", self.timeout);

        // a failed cleanup must not shadow what the transcode reported
        cleanup_intermediate(&intermediate);
        transcode?;

        Ok(target)
    }
}

/// Claim a target name for this request. Creating the file (instead of
/// testing for it) makes the claim atomic across workers.
fn reserve(candidate: &Path) -> Result<bool, DownloadError> {
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(candidate)
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(DownloadError::Io(e)),
    }
}

fn cleanup_intermediate(intermediate: &Path) {
    if let Err(e) = fs::remove_file(intermediate) {
        warn!(
            "cannot remove intermediate \"{}\": {}",
            intermediate.display(),
            e
        );
    }
}

/// Replace path-hostile characters so the identity can be used as a file
/// name on any filesystem.
pub fn sanitize_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim().trim_end_matches('.').to_string();

    if cleaned.is_empty() {
        "track".to_string()
    } else {
        cleaned
    }
}

/// Run a subprocess, capturing stdout, and kill it when `timeout` expires.
/// A non-zero exit turns into [`DownloadError::ToolFailed`] carrying stderr.
fn run_with_timeout(
    mut command: Command,
    tool: &'static str,
    timeout: Duration,
) -> Result<String, DownloadError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|source| DownloadError::Spawn { tool, source })?;

    // Drain the pipes from their own threads so a chatty child cannot fill
    // the pipe buffer and stall before the deadline check sees it exit.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_stdout(stdout_pipe));
    let stderr_reader = std::thread::spawn(move || read_stderr(stderr_pipe));

    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DownloadError::TimedOut { tool, timeout });
            }
            None => std::thread::sleep(Duration::from_millis(200)),
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if status.success() {
        Ok(stdout)
    } else {
        Err(DownloadError::ToolFailed { tool, stderr })
    }
}

fn read_stdout(pipe: Option<ChildStdout>) -> String {
    let mut buffer = Vec::new();

    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer);
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

fn read_stderr(pipe: Option<ChildStderr>) -> String {
    let mut buffer = Vec::new();

    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer);
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ParsedIdentity {
        ParsedIdentity {
            artist: "Sum 41".to_string(),
            title: "In Too Deep".to_string(),
        }
    }

    #[test]
    fn it_keeps_plain_names_untouched() {
        assert_eq!(sanitize_stem("Sum 41 - In Too Deep"), "Sum 41 - In Too Deep");
    }

    #[test]
    fn it_replaces_path_hostile_characters() {
        assert_eq!(sanitize_stem("AC/DC: Back in Black?"), "AC_DC_ Back in Black_");
    }

    #[test]
    fn it_never_returns_an_empty_stem() {
        assert_eq!(sanitize_stem("   "), "track");
        assert_eq!(sanitize_stem("..."), "track");
    }

    #[test]
    fn it_rejects_a_non_http_url() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Overwrite,
        );

        let result = downloader.download("ftp://example.com/a.mp3", &identity());

        assert!(matches!(result, Err(DownloadError::BadUrl { .. })));
    }

    #[test]
    fn it_rejects_garbage_urls() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Overwrite,
        );

        let result = downloader.download("not a url at all", &identity());

        assert!(matches!(result, Err(DownloadError::BadUrl { .. })));
    }

    #[test]
    fn it_overwrites_existing_targets_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a - b.mp3"), b"old").unwrap();

        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Overwrite,
        );

        assert_eq!(
            downloader.target_path("a - b").unwrap(),
            dir.path().join("a - b.mp3")
        );
    }

    #[test]
    fn it_suffixes_existing_targets_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a - b.mp3"), b"old").unwrap();
        std::fs::write(dir.path().join("a - b (1).mp3"), b"older").unwrap();

        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Suffix,
        );

        assert_eq!(
            downloader.target_path("a - b").unwrap(),
            dir.path().join("a - b (2).mp3")
        );
    }

    #[test]
    fn it_uses_the_plain_name_when_free() {
        let dir = tempfile::tempdir().unwrap();

        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Suffix,
        );

        assert_eq!(
            downloader.target_path("a - b").unwrap(),
            dir.path().join("a - b.mp3")
        );
    }

    #[test]
    fn it_never_hands_the_same_suffixed_name_to_two_requests() {
        let dir = tempfile::tempdir().unwrap();

        let downloader = YtDlpDownloader::new(
            dir.path().to_path_buf(),
            Duration::from_secs(5),
            CollisionPolicy::Suffix,
        );

        // Neither request has written its mp3 yet, as happens when several
        // workers download the same identity at once.
        let first = downloader.target_path("a - b").unwrap();
        let second = downloader.target_path("a - b").unwrap();

        assert_eq!(first, dir.path().join("a - b.mp3"));
        assert_eq!(second, dir.path().join("a - b (1).mp3"));
        assert_ne!(first, second);
    }

    #[test]
    fn it_kills_a_subprocess_that_outlives_the_timeout() {
        let mut command = Command::new("sleep");
        command.arg("5");

        let result = run_with_timeout(command, "sleep", Duration::from_millis(100));

        assert!(matches!(
            result,
            Err(DownloadError::TimedOut { tool: "sleep", .. })
        ));
    }

    #[test]
    fn it_captures_stderr_of_a_failing_subprocess() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo boom >&2; exit 1"]);

        let result = run_with_timeout(command, "sh", Duration::from_secs(5));

        match result {
            Err(DownloadError::ToolFailed { tool: "sh", stderr }) => {
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[test]
    fn it_tolerates_a_missing_intermediate_on_cleanup() {
        let dir = tempfile::tempdir().unwrap();

        // The transcode error must survive cleanup, so removal never fails.
        cleanup_intermediate(&dir.path().join("gone.source.webm"));
    }
}
