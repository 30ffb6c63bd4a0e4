//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Telegram gateway error: {0}")]
    TgGateway(String),

    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("No read access to chat history: {0}")]
    NoReadAccess(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Single-message failure (file deleted/expired remotely, write failed).
    #[error("Media download failed: {0}")]
    Media(String),

    /// Local filesystem failure while preparing a chat's directory tree.
    #[error("Directory setup failed: {0}")]
    Directory(String),

    #[error("Repository error: {0}")]
    Repo(String),

    /// FloodWait error: caller should retry after `seconds` seconds.
    #[error("FloodWait: retry after {seconds} seconds")]
    FloodWait { seconds: u64 },

    /// The user aborted an interactive prompt.
    #[error("Cancelled by user")]
    Cancelled,
}

/// Non-success outcomes of the QR login handshake. Surfaced to callers as a status, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("login was not started")]
    NotStarted,

    #[error("QR token expired")]
    Expired,

    #[error("two-factor password required")]
    TwoFactorRequired,

    #[error("login failed: {0}")]
    Failed(String),
}

impl AuthError {
    /// Short code carried in the `detail` field of `pollAuth` responses.
    pub fn detail(&self) -> String {
        match self {
            AuthError::NotStarted => "login_not_started".to_string(),
            AuthError::Expired => "expired".to_string(),
            AuthError::TwoFactorRequired => "2fa_required".to_string(),
            AuthError::Failed(reason) => reason.clone(),
        }
    }
}
