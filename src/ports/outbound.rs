//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    ChatRecord, DomainError, LoginPoll, MediaMessage, QrToken, ResolvedChat, TopicRecord,
};

/// Telegram API gateway. Fetch dialogs, resolve chats, read history, download media.
#[async_trait::async_trait]
pub trait TgGateway: Send + Sync {
    /// Fetch all dialogs (chats) the account participates in.
    async fn get_dialogs(&self) -> Result<Vec<ChatRecord>, DomainError>;

    /// Resolve a public username (without `@`) to a chat handle.
    async fn resolve_username(&self, username: &str) -> Result<ResolvedChat, DomainError>;

    /// Resolve a chat by its numeric id. Needs the access credential to be known to the session.
    async fn resolve_id(&self, chat_id: i64) -> Result<ResolvedChat, DomainError>;

    /// Fetch a single page of up to `limit` forum topics.
    async fn get_forum_topics(
        &self,
        chat: &ResolvedChat,
        limit: i32,
    ) -> Result<Vec<TopicRecord>, DomainError>;

    /// Fetch one page of history, newest first.
    ///
    /// - `offset_id`: 0 = start from the newest message; N = only messages with id < N
    /// - `limit`: max messages per request
    async fn get_history(
        &self,
        chat: &ResolvedChat,
        offset_id: i32,
        limit: i32,
    ) -> Result<Vec<MediaMessage>, DomainError>;

    /// Download a message's media to `dest_path`.
    async fn download_media(
        &self,
        chat: &ResolvedChat,
        message: &MediaMessage,
        dest_path: &std::path::Path,
    ) -> Result<(), DomainError>;
}

/// Auth port. QR login transport.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    /// True if the stored session is already authorized.
    async fn is_authenticated(&self) -> Result<bool, DomainError>;

    /// Issue a fresh login token. Any previous token becomes stale.
    async fn export_login_token(&self) -> Result<QrToken, DomainError>;

    /// Check once whether the current token has been approved.
    async fn poll_login_token(&self) -> Result<LoginPoll, DomainError>;

    /// Complete a login that requires the account's cloud password.
    async fn check_password(&self, password: &str) -> Result<(), DomainError>;
}

/// Chat listing snapshot storage.
#[async_trait::async_trait]
pub trait ChatListPort: Send + Sync {
    /// Replace the snapshot with `chats`.
    async fn save(&self, chats: &[ChatRecord]) -> Result<(), DomainError>;

    /// Read the snapshot back. Returns an empty list if none was written yet.
    async fn load(&self) -> Result<Vec<ChatRecord>, DomainError>;
}
