//! Map Grammers types to domain entities.
//!
//! Extracts ChatRecord, MediaMessage and TopicRecord from grammers_client tl types.

use crate::domain::{placeholder_title, ChatRecord, ChatType, MediaMessage, MediaPayload, TopicRecord};
use chrono::{DateTime, Utc};
use grammers_client::peer::Peer;
use grammers_client::tl;

/// Map a grammers Peer to domain ChatType.
///
/// * `Peer::User` → Private (DM).
/// * `Peer::Group` → Group or Supergroup (Supergroup when megagroup).
/// * `Peer::Channel` → Channel (broadcast).
pub fn chat_type_from_peer(peer: &Peer) -> ChatType {
    match peer {
        Peer::User(_) => ChatType::Private,
        Peer::Group(g) => {
            if g.is_megagroup() {
                ChatType::Supergroup
            } else {
                ChatType::Group
            }
        }
        Peer::Channel(_) => ChatType::Channel,
    }
}

/// True for supergroups with topics enabled.
pub fn is_forum(peer: &Peer) -> bool {
    match peer {
        Peer::User(_) => false,
        Peer::Group(g) => matches!(&g.raw, tl::enums::Chat::Channel(ch) if ch.forum),
        Peer::Channel(c) => c.raw.forum,
    }
}

/// Member count and access hash, when the peer carries them.
fn peer_counts(peer: &Peer) -> (i32, Option<i64>) {
    match peer {
        Peer::User(_) => (0, None),
        Peer::Group(g) => match &g.raw {
            tl::enums::Chat::Chat(ch) => (ch.participants_count, None),
            tl::enums::Chat::Channel(ch) => (ch.participants_count.unwrap_or(0), ch.access_hash),
            _ => (0, None),
        },
        Peer::Channel(c) => (c.raw.participants_count.unwrap_or(0), c.raw.access_hash),
    }
}

/// Map a dialog's peer to a listing record. `date` is the dialog's last activity.
pub fn chat_record(peer: &Peer, date: Option<DateTime<Utc>>) -> ChatRecord {
    let id = peer.id().bot_api_dialog_id();
    let title = peer
        .name()
        .filter(|n| !n.trim().is_empty())
        .map(String::from)
        .unwrap_or_else(|| placeholder_title(id));
    let (participants_count, access_hash) = peer_counts(peer);
    ChatRecord {
        id,
        title,
        username: peer.username().map(String::from),
        chat_type: chat_type_from_peer(peer),
        participants_count,
        date,
        access_hash,
        is_forum: is_forum(peer),
    }
}

/// Unix seconds from the wire to UTC.
pub fn timestamp(secs: i32) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(i64::from(secs), 0).unwrap_or_default()
}

/// Top message of the reply thread a message belongs to.
///
/// Nested replies inside a topic carry the topic id in `reply_to_top_id`. A message posted
/// directly into a topic has no top id; its header is flagged `forum_topic` and
/// `reply_to_msg_id` is the topic id.
pub fn thread_top_id(
    forum_topic: bool,
    reply_to_msg_id: Option<i32>,
    reply_to_top_id: Option<i32>,
) -> Option<i32> {
    reply_to_top_id.or(if forum_topic { reply_to_msg_id } else { None })
}

/// Map a history entry. Service messages are kept without media so they still count as walked.
pub fn message_to_domain(msg: &tl::enums::Message) -> Option<MediaMessage> {
    match msg {
        tl::enums::Message::Empty(_) => None,
        tl::enums::Message::Message(m) => Some(MediaMessage {
            id: m.id,
            date: timestamp(m.date),
            media: m.media.as_ref().map(media_payload),
            thread_top_id: m.reply_to.as_ref().and_then(|r| match r {
                tl::enums::MessageReplyHeader::Header(h) => {
                    thread_top_id(h.forum_topic, h.reply_to_msg_id, h.reply_to_top_id)
                }
                _ => None,
            }),
        }),
        tl::enums::Message::Service(m) => Some(MediaMessage {
            id: m.id,
            date: timestamp(m.date),
            media: None,
            thread_top_id: None,
        }),
    }
}

/// What the document attributes say about a file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocumentTraits {
    pub sticker: bool,
    pub voice: bool,
    pub audio: bool,
    pub video: bool,
    pub file_name: Option<String>,
}

impl DocumentTraits {
    pub fn from_attributes(attributes: &[tl::enums::DocumentAttribute]) -> Self {
        let mut traits = Self::default();
        for attr in attributes {
            match attr {
                tl::enums::DocumentAttribute::Sticker(_) => traits.sticker = true,
                tl::enums::DocumentAttribute::Audio(a) => {
                    if a.voice {
                        traits.voice = true;
                    } else {
                        traits.audio = true;
                    }
                }
                tl::enums::DocumentAttribute::Video(_) => traits.video = true,
                tl::enums::DocumentAttribute::Filename(f) => {
                    traits.file_name = Some(f.file_name.clone());
                }
                _ => {}
            }
        }
        traits
    }

    /// Stickers win over video (animated stickers carry both), voice over audio.
    pub fn payload(self) -> MediaPayload {
        if self.sticker {
            MediaPayload::Sticker
        } else if self.voice {
            MediaPayload::Voice
        } else if self.audio {
            MediaPayload::Audio
        } else if self.video {
            MediaPayload::Video
        } else {
            MediaPayload::Document {
                file_name: self.file_name,
            }
        }
    }
}

/// Close the media union once, at the transport edge.
pub fn media_payload(media: &tl::enums::MessageMedia) -> MediaPayload {
    match media {
        tl::enums::MessageMedia::Photo(_) => MediaPayload::Photo,
        tl::enums::MessageMedia::Document(d) => match d.document.as_ref() {
            Some(tl::enums::Document::Document(doc)) => {
                DocumentTraits::from_attributes(&doc.attributes).payload()
            }
            _ => MediaPayload::Other,
        },
        _ => MediaPayload::Other,
    }
}

/// Map a forum topic. Deleted topics are dropped.
pub fn topic_to_domain(topic: &tl::enums::ForumTopic) -> Option<TopicRecord> {
    match topic {
        tl::enums::ForumTopic::Topic(t) => Some(TopicRecord {
            id: t.id,
            title: t.title.clone(),
        }),
        tl::enums::ForumTopic::Deleted(_) => None,
    }
}
