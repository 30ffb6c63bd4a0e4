//! Implements ChatListPort using a pretty-printed JSON file (`chat_list.json`).
//!
//! UTF-8, non-ASCII kept as-is. Dates are written as RFC 3339 strings.

use crate::domain::{ChatRecord, DomainError};
use crate::ports::ChatListPort;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File name of the listing snapshot under the exports root.
pub const CHAT_LIST_FILE: &str = "chat_list.json";

/// JSON file-based chat listing.
pub struct ChatListJson {
    path: PathBuf,
}

impl ChatListJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Snapshot at `<exports_root>/chat_list.json`.
    pub fn in_dir(exports_root: impl AsRef<Path>) -> Self {
        Self::new(exports_root.as_ref().join(CHAT_LIST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ChatListPort for ChatListJson {
    /// Write-replace: temp file, sync, rename. A crash mid-write leaves the old snapshot intact.
    async fn save(&self, chats: &[ChatRecord]) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Repo(format!("create {}: {}", parent.display(), e)))?;
        }
        let json =
            serde_json::to_string_pretty(chats).map_err(|e| DomainError::Repo(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Repo(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Repo(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Repo(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Repo(format!("atomic rename failed: {}", e)))
    }

    async fn load(&self) -> Result<Vec<ChatRecord>, DomainError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).map_err(|e| DomainError::Repo(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(DomainError::Repo(e.to_string())),
        }
    }
}
