//! Session management. Load/save grammers session and connect a client.
//!
//! Uses grammers-session's SqliteSession for persistent file-based storage so
//! authorization is preserved across application restarts.

use crate::domain::DomainError;
use grammers_client::{Client, SenderPool};
use grammers_session::storages::SqliteSession;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Opens a persistent session storage at the given path.
///
/// The file is created if it does not exist. Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, or if the
/// SQLite database cannot be opened (e.g. permissions, disk full).
pub async fn open_file_session(path: impl AsRef<Path>) -> Result<SqliteSession, DomainError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Repo(format!("create session directory: {}", e)))?;
    }
    SqliteSession::open(path)
        .await
        .map_err(|e| DomainError::Repo(format!("open session file {}: {}", path.display(), e)))
}

/// Open the session file and start a client on it.
///
/// The sender pool runs on a background task for the lifetime of the process. The returned
/// client is a cheap handle; clones share the same connection and session.
pub async fn connect(session_path: &Path, api_id: i32) -> Result<Client, DomainError> {
    let session = Arc::new(open_file_session(session_path).await?);
    let pool = SenderPool::new(session, api_id);
    let handle = pool.handle.clone();
    tokio::spawn(async move {
        pool.runner.run().await;
    });
    info!(path = %session_path.display(), "telegram client started");
    Ok(Client::new(handle))
}
