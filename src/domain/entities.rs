//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram/IO types here; adapters map into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A chat (user, group, or channel) as seen in the dialog listing.
///
/// Unique by `id` within a listing. Serialized as-is into `chat_list.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    #[serde(default)]
    pub participants_count: i32,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_hash: Option<i64>,
    #[serde(default)]
    pub is_forum: bool,
}

impl ChatRecord {
    /// Builds a record for a chat that was not part of the last listing.
    /// Only id and username are known; the title is a placeholder.
    pub fn synthetic(id: i64, username: Option<String>) -> Self {
        Self {
            id,
            title: placeholder_title(id),
            username: username.filter(|u| !u.trim().is_empty()),
            chat_type: ChatType::Unknown,
            participants_count: 0,
            date: None,
            access_hash: None,
            is_forum: false,
        }
    }
}

/// Title used when a chat has none (users, synthetic records).
pub fn placeholder_title(id: i64) -> String {
    format!("Chat_{}", id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
    Unknown,
}

impl ChatType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
            ChatType::Supergroup => "supergroup",
            ChatType::Channel => "channel",
            ChatType::Unknown => "unknown",
        }
    }
}

/// A live handle for a chat, produced by entity resolution. Required before history can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChat {
    pub id: i64,
    pub title: String,
    pub is_forum: bool,
}

/// A forum topic. Id is unique within its chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: i32,
    pub title: String,
}

/// A single history item, reduced to what the export needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMessage {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub media: Option<MediaPayload>,
    /// Id of the top message of the reply thread. For forum chats this is the topic id.
    pub thread_top_id: Option<i32>,
}

/// Media attached to a message. Closed set; produced once by the transport mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    Photo,
    Video,
    Voice,
    Audio,
    Sticker,
    Document { file_name: Option<String> },
    /// Media the exporter has no dedicated bucket for (geo, contact, poll, web page...).
    Other,
}

/// Media type tag. Also names the per-type directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Other,
}

impl MediaKind {
    pub const ALL: [MediaKind; 7] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Document,
        MediaKind::Audio,
        MediaKind::Voice,
        MediaKind::Sticker,
        MediaKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Sticker => "sticker",
            MediaKind::Other => "other",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of exporting a single chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportResult {
    pub processed_count: usize,
    pub downloaded_count: usize,
    /// Topic title -> files downloaded into that topic.
    pub per_topic: BTreeMap<String, usize>,
}

/// Aggregate of a batch export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
}

/// Login token issued for QR login. Rendered as a `tg://login` URL for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken {
    pub token: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl QrToken {
    pub fn url(&self) -> String {
        use base64::Engine;
        format!(
            "tg://login?token={}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&self.token)
        )
    }
}

/// Outcome of a single check of a pending QR login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    /// Not scanned yet.
    Pending,
    /// Approved from another device; the session is authorized.
    Accepted,
    /// Approved, but the account has a cloud password.
    PasswordRequired { hint: Option<String> },
}
