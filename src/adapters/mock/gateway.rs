//! In-memory TgGateway for tests and offline runs.
//!
//! Chats are declared with the `MockChat` builder; downloads write a small marker file.

use crate::domain::{
    ChatRecord, ChatType, DomainError, MediaMessage, MediaPayload, ResolvedChat, TopicRecord,
};
use crate::ports::TgGateway;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// 2024-01-02T03:04:05Z. Base date of mock messages; message `id` adds `id` seconds.
const BASE_TIMESTAMP: i64 = 1_704_164_645;

/// A chat known to the mock gateway.
#[derive(Debug, Clone)]
pub struct MockChat {
    record: ChatRecord,
    resolvable: bool,
    topics: Vec<TopicRecord>,
    topics_fail: bool,
    messages: Vec<MediaMessage>,
    history_denied: bool,
    failing_downloads: HashSet<i32>,
}

impl MockChat {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            record: ChatRecord {
                id,
                title: title.to_string(),
                username: None,
                chat_type: ChatType::Supergroup,
                participants_count: 0,
                date: None,
                access_hash: Some(id.wrapping_mul(31)),
                is_forum: false,
            },
            resolvable: true,
            topics: Vec::new(),
            topics_fail: false,
            messages: Vec::new(),
            history_denied: false,
            failing_downloads: HashSet::new(),
        }
    }

    pub fn username(mut self, username: &str) -> Self {
        self.record.username = Some(username.to_string());
        self
    }

    pub fn forum(mut self) -> Self {
        self.record.is_forum = true;
        self
    }

    pub fn topic(mut self, id: i32, title: &str) -> Self {
        self.topics.push(TopicRecord {
            id,
            title: title.to_string(),
        });
        self
    }

    /// Topic listing fails (e.g. missing admin rights).
    pub fn topics_fail(mut self) -> Self {
        self.topics_fail = true;
        self
    }

    /// Neither username nor id lookups succeed.
    pub fn unresolvable(mut self) -> Self {
        self.resolvable = false;
        self
    }

    /// History cannot be read.
    pub fn deny_history(mut self) -> Self {
        self.history_denied = true;
        self
    }

    pub fn message(mut self, message: MediaMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Message with media, outside any topic.
    pub fn media(self, id: i32, payload: MediaPayload) -> Self {
        self.message(mock_message(id, Some(payload), None))
    }

    /// Message with media, posted into the thread whose top message is `thread_top_id`.
    pub fn thread_media(self, id: i32, thread_top_id: i32, payload: MediaPayload) -> Self {
        self.message(mock_message(id, Some(payload), Some(thread_top_id)))
    }

    /// Message without media.
    pub fn text(self, id: i32) -> Self {
        self.message(mock_message(id, None, None))
    }

    /// Downloading this message's media fails.
    pub fn fail_download(mut self, id: i32) -> Self {
        self.failing_downloads.insert(id);
        self
    }

    pub fn record(&self) -> &ChatRecord {
        &self.record
    }

    fn resolved(&self) -> ResolvedChat {
        ResolvedChat {
            id: self.record.id,
            title: self.record.title.clone(),
            is_forum: self.record.is_forum,
        }
    }
}

/// Build a message dated `BASE_TIMESTAMP + id` seconds.
pub fn mock_message(id: i32, media: Option<MediaPayload>, thread_top_id: Option<i32>) -> MediaMessage {
    MediaMessage {
        id,
        date: DateTime::<Utc>::from_timestamp(BASE_TIMESTAMP + i64::from(id), 0)
            .unwrap_or_default(),
        media,
        thread_top_id,
    }
}

/// Mock gateway. Records lookup calls (`username:<name>`, `id:<id>`, `topics:<id>`).
#[derive(Debug, Default)]
pub struct MockTgGateway {
    chats: Vec<MockChat>,
    calls: Mutex<Vec<String>>,
}

impl MockTgGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, chat: MockChat) -> Self {
        self.chats.push(chat);
        self
    }

    /// Lookup calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn chat(&self, id: i64) -> Result<&MockChat, DomainError> {
        self.chats
            .iter()
            .find(|c| c.record.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("peer {} not found", id)))
    }
}

#[async_trait::async_trait]
impl TgGateway for MockTgGateway {
    async fn get_dialogs(&self) -> Result<Vec<ChatRecord>, DomainError> {
        Ok(self.chats.iter().map(|c| c.record.clone()).collect())
    }

    async fn resolve_username(&self, username: &str) -> Result<ResolvedChat, DomainError> {
        self.record_call(format!("username:{}", username));
        self.chats
            .iter()
            .find(|c| c.resolvable && c.record.username.as_deref() == Some(username))
            .map(MockChat::resolved)
            .ok_or_else(|| DomainError::NotFound(format!("USERNAME_NOT_OCCUPIED: {}", username)))
    }

    async fn resolve_id(&self, chat_id: i64) -> Result<ResolvedChat, DomainError> {
        self.record_call(format!("id:{}", chat_id));
        let chat = self.chat(chat_id)?;
        if !chat.resolvable {
            return Err(DomainError::NotFound(format!(
                "peer {} not in session cache",
                chat_id
            )));
        }
        Ok(chat.resolved())
    }

    async fn get_forum_topics(
        &self,
        chat: &ResolvedChat,
        limit: i32,
    ) -> Result<Vec<TopicRecord>, DomainError> {
        self.record_call(format!("topics:{}", chat.id));
        let mock = self.chat(chat.id)?;
        if mock.topics_fail {
            return Err(DomainError::NoReadAccess("CHAT_ADMIN_REQUIRED".into()));
        }
        Ok(mock
            .topics
            .iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn get_history(
        &self,
        chat: &ResolvedChat,
        offset_id: i32,
        limit: i32,
    ) -> Result<Vec<MediaMessage>, DomainError> {
        let mock = self.chat(chat.id)?;
        if mock.history_denied {
            return Err(DomainError::NoReadAccess("CHANNEL_PRIVATE".into()));
        }
        let mut page: Vec<MediaMessage> = mock
            .messages
            .iter()
            .filter(|m| offset_id == 0 || m.id < offset_id)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(page)
    }

    async fn download_media(
        &self,
        chat: &ResolvedChat,
        message: &MediaMessage,
        dest_path: &Path,
    ) -> Result<(), DomainError> {
        let mock = self.chat(chat.id)?;
        if mock.failing_downloads.contains(&message.id) {
            return Err(DomainError::Media("FILE_REFERENCE_EXPIRED".into()));
        }
        tokio::fs::write(dest_path, format!("{}:{}", chat.id, message.id))
            .await
            .map_err(|e| DomainError::Media(format!("write {}: {}", dest_path.display(), e)))
    }
}
