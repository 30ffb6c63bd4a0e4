//! Inbound port. UI/CLI (or an HTTP layer) calls into the application.

use crate::domain::{ChatRecord, DomainError};
use serde::{Deserialize, Serialize};

/// Response of `start_auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAuthResponse {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_url: Option<String>,
}

/// Response of `poll_auth`. `detail` carries `2fa_required`, `expired`, or a failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAuthResponse {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Caller-supplied reference to a chat to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDescriptor {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Response of `export_chats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Input port: the operations exposed to external callers.
#[async_trait::async_trait]
pub trait ExporterApi: Send + Sync {
    /// Connect and either report an existing authorization or issue a QR token.
    async fn start_auth(&self) -> Result<StartAuthResponse, DomainError>;

    /// Wait for the QR token to be approved. `password` completes a two-factor login.
    async fn poll_auth(&self, password: Option<String>) -> Result<PollAuthResponse, DomainError>;

    /// List all chats and write the listing snapshot.
    async fn list_chats(&self) -> Result<Vec<ChatRecord>, DomainError>;

    /// Export media of the given chats, at most `limit_per_chat` messages each.
    async fn export_chats(
        &self,
        chats: Vec<ChatDescriptor>,
        limit_per_chat: usize,
    ) -> Result<ExportSummary, DomainError>;
}
