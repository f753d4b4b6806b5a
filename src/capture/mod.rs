//! Recording acquisition: join-and-record live meetings, or fetch a shared
//! recording link, or store an uploaded file. Every path ends with one audio
//! file on local disk ready for the analysis pipeline.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::{CaptureConfig, StorageConfig};

pub mod download;
pub mod meet_bot;

pub use meet_bot::MeetingBot;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// Browser join or audio capture could not produce a recording.
    #[error("Failed to capture live meeting: {0}")]
    CaptureFailed(String),
    /// The shared link resolved to an HTML page (permission or sign-in
    /// screen), not a media file.
    #[error("Link did not return a media file: {0}")]
    InvalidSource(String),
    /// The shared link could not be fetched or streamed to disk.
    #[error("Failed to download recording: {0}")]
    DownloadFailed(String),
}

pub struct RecordingAcquirer {
    bot: MeetingBot,
    http: reqwest::Client,
    uploads_dir: PathBuf,
    max_recordings: usize,
}

impl RecordingAcquirer {
    pub fn new(
        capture: CaptureConfig,
        storage: &StorageConfig,
        recordings_dir: PathBuf,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            bot: MeetingBot::new(capture, recordings_dir),
            http: reqwest::Client::new(),
            uploads_dir,
            max_recordings: storage.max_recordings,
        }
    }

    /// Join a live meeting and record it. `duration` is clamped to the
    /// configured maximum; None records for the full maximum.
    pub async fn capture_live(
        &self,
        meet_link: &str,
        duration: Option<Duration>,
    ) -> Result<PathBuf, AcquireError> {
        let path = self.bot.capture_live(meet_link, duration).await?;
        self.prune();
        Ok(path)
    }

    /// Download a shared recording link into the uploads directory.
    pub async fn download_shared_recording(&self, url: &str) -> Result<PathBuf, AcquireError> {
        let path = download::download_shared_recording(&self.http, url, &self.uploads_dir).await?;
        self.prune();
        Ok(path)
    }

    /// Begin storing an uploaded file body in the uploads directory. The
    /// returned sink takes the body chunk by chunk, so a large upload never
    /// sits in memory whole.
    pub async fn create_upload(&self, file_name: &str) -> Result<UploadSink> {
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .context("Failed to create uploads directory")?;

        let name = format!("{}_{}", chrono::Utc::now().timestamp_millis(), file_name);
        let path = self.uploads_dir.join(name);

        let file = tokio::fs::File::create(&path)
            .await
            .context("Failed to create upload file")?;

        self.prune();
        Ok(UploadSink { path, file })
    }

    fn prune(&self) {
        for dir in [self.bot.recordings_dir(), self.uploads_dir.as_path()] {
            match prune_oldest(dir, self.max_recordings) {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} old recording(s) from {:?}", n, dir),
                Err(e) => warn!("Failed to prune recordings in {:?}: {}", dir, e),
            }
        }
    }
}

/// An in-progress upload. Written chunk by chunk; the file path is only
/// handed back once the body is fully flushed.
pub struct UploadSink {
    path: PathBuf,
    file: tokio::fs::File,
}

impl UploadSink {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .context("Failed to write upload chunk")
    }

    pub async fn finish(mut self) -> Result<PathBuf> {
        self.file
            .flush()
            .await
            .context("Failed to flush upload file")?;

        info!("Uploaded file stored at {:?}", self.path);
        Ok(self.path)
    }
}

/// Delete the oldest files in `dir` beyond `max_count`. Storage would
/// otherwise grow without bound, one file per analyzed meeting.
pub fn prune_oldest(dir: &Path, max_count: usize) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut files: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).context("Failed to read recordings directory")? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let modified = entry.metadata()?.modified()?;
            files.push((modified, entry.path()));
        }
    }

    if files.len() <= max_count {
        return Ok(0);
    }

    files.sort_by_key(|(modified, _)| *modified);
    let excess = files.len() - max_count;

    let mut deleted = 0;
    for (_, path) in files.into_iter().take(excess) {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete old recording {:?}", path))?;
        deleted += 1;
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_upload_sink_writes_chunks_to_uploads_dir() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = RecordingAcquirer::new(
            CaptureConfig::default(),
            &StorageConfig::default(),
            dir.path().join("recordings"),
            dir.path().join("uploads"),
        );

        let mut sink = acquirer.create_upload("meeting.m4a").await.unwrap();
        sink.write(b"first ").await.unwrap();
        sink.write(b"second").await.unwrap();
        let path = sink.finish().await.unwrap();

        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_meeting.m4a"));
        assert_eq!(fs::read(&path).unwrap(), b"first second");
    }

    #[test]
    fn test_prune_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("rec_{i}.mp3"));
            fs::write(&path, b"audio").unwrap();
            // Distinct mtimes so ordering is deterministic
            let t = filetime_from_secs(1_000_000 + i);
            set_mtime(&path, t);
        }

        let deleted = prune_oldest(dir.path(), 2).unwrap();
        assert_eq!(deleted, 3);

        let remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&"rec_3.mp3".to_string()));
        assert!(remaining.contains(&"rec_4.mp3".to_string()));
    }

    #[test]
    fn test_prune_under_limit_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rec.mp3"), b"audio").unwrap();
        assert_eq!(prune_oldest(dir.path(), 10).unwrap(), 0);
    }

    #[test]
    fn test_prune_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(prune_oldest(&missing, 10).unwrap(), 0);
    }

    fn filetime_from_secs(secs: u64) -> std::time::SystemTime {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs)
    }

    fn set_mtime(path: &Path, time: std::time::SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }
}
