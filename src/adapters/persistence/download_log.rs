//! Append-only per-chat download log (`download_log.txt`).
//!
//! One line per downloaded file. Write-only: nothing reads it back.

use crate::domain::{DomainError, MediaKind};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Fields of a single log line.
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    pub filename: &'a str,
    pub kind: MediaKind,
    pub message_id: i32,
    pub message_date: DateTime<Utc>,
    pub topic: Option<&'a str>,
}

/// Format a log line. `written_at` is the wall-clock time of the write.
pub fn format_line(written_at: DateTime<Local>, entry: &LogEntry<'_>) -> String {
    let topic = entry
        .topic
        .map(|t| format!(" - topic: {}", t))
        .unwrap_or_default();
    format!(
        "{}: {} - {} - msg id: {} - date: {}{}\n",
        written_at.format("%Y-%m-%d %H:%M:%S%.6f"),
        entry.filename,
        entry.kind,
        entry.message_id,
        entry.message_date.format("%Y-%m-%d %H:%M:%S%:z"),
        topic
    )
}

/// Open log file handle. Owned by a single chat export.
pub struct DownloadLog {
    path: PathBuf,
    file: File,
}

impl DownloadLog {
    /// Open (or create) the log for appending.
    ///
    /// The log sits at the chat root, so failing to open it is a directory setup failure.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DomainError::Directory(format!("open {}: {}", path.display(), e)))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it.
    pub async fn record(&mut self, entry: &LogEntry<'_>) -> Result<(), DomainError> {
        let line = format_line(Local::now(), entry);
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DomainError::Repo(format!("write {}: {}", self.path.display(), e)))?;
        self.file
            .flush()
            .await
            .map_err(|e| DomainError::Repo(format!("flush {}: {}", self.path.display(), e)))
    }
}
