//! Implements TgGateway using grammers Client.
//!
//! Handles FloodWait by sleeping and retrying. Uses raw invoke for GetHistory
//! (offset paging) and GetForumTopics.

use crate::adapters::telegram::mapper;
use crate::domain::{ChatRecord, DomainError, MediaMessage, ResolvedChat, TopicRecord};
use crate::ports::TgGateway;
use async_trait::async_trait;
use grammers_client::peer::Peer;
use grammers_client::tl;
use grammers_client::Client;
use grammers_client::InvocationError;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Attempts per request when the server answers FLOOD_WAIT.
const FLOOD_WAIT_RETRIES: usize = 3;

/// RPC errors meaning the account may not read the chat.
const NO_ACCESS_ERRORS: [&str; 4] = [
    "CHANNEL_PRIVATE",
    "CHAT_ADMIN_REQUIRED",
    "CHAT_FORBIDDEN",
    "CHANNEL_INVALID",
];

/// RPC errors meaning the chat does not exist.
const NOT_FOUND_ERRORS: [&str; 2] = ["USERNAME_NOT_OCCUPIED", "USERNAME_INVALID"];

/// Map an RPC failure to the domain taxonomy.
pub fn rpc_to_domain(code: i32, name: &str, value: Option<u32>) -> DomainError {
    if code == 420 || name.starts_with("FLOOD_WAIT") {
        return DomainError::FloodWait {
            seconds: u64::from(value.unwrap_or(60)),
        };
    }
    if NO_ACCESS_ERRORS.contains(&name) {
        DomainError::NoReadAccess(name.to_string())
    } else if NOT_FOUND_ERRORS.contains(&name) {
        DomainError::NotFound(name.to_string())
    } else {
        DomainError::TgGateway(format!("{} ({})", name, code))
    }
}

fn invocation_to_domain(e: InvocationError) -> DomainError {
    match e {
        InvocationError::Rpc(rpc) => rpc_to_domain(rpc.code, &rpc.name, rpc.value),
        other => DomainError::TgGateway(other.to_string()),
    }
}

/// Telegram gateway adapter. Wraps grammers Client (a clone shares the session with the auth adapter).
pub struct GrammersTgGateway {
    client: Client,
    /// If set, sleep this many ms before each message-history request (rate limiting).
    export_delay_ms: Option<u64>,
    /// Peers by Bot API dialog id, filled from dialog listings and username lookups.
    peer_cache: Mutex<HashMap<i64, Peer>>,
}

impl GrammersTgGateway {
    pub fn new(client: Client, export_delay_ms: Option<u64>) -> Self {
        Self {
            client,
            export_delay_ms,
            peer_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Invoke a raw request, sleeping through FLOOD_WAIT up to `FLOOD_WAIT_RETRIES` times.
    async fn invoke<R: tl::RemoteCall>(&self, req: &R) -> Result<R::Return, DomainError> {
        for attempt in 0..FLOOD_WAIT_RETRIES {
            match self.client.invoke(req).await {
                Ok(res) => return Ok(res),
                Err(e) => match invocation_to_domain(e) {
                    DomainError::FloodWait { seconds } => {
                        warn!(attempt, wait_secs = seconds, "FloodWait, sleeping");
                        tokio::time::sleep(Duration::from_secs(seconds)).await;
                    }
                    other => return Err(other),
                },
            }
        }
        Err(DomainError::TgGateway("FloodWait max retries".into()))
    }

    /// Cached peer, or a walk of the dialog list.
    async fn peer(&self, chat_id: i64) -> Result<Peer, DomainError> {
        if let Some(peer) = self.peer_cache.lock().await.get(&chat_id) {
            return Ok(peer.clone());
        }
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(invocation_to_domain)? {
            let p = dialog.peer();
            if p.id().bot_api_dialog_id() == chat_id {
                let peer = p.clone();
                self.peer_cache.lock().await.insert(chat_id, peer.clone());
                return Ok(peer);
            }
        }
        Err(DomainError::NotFound(format!("peer {} not found in dialogs", chat_id)))
    }

    async fn input_peer(&self, chat_id: i64) -> Result<tl::enums::InputPeer, DomainError> {
        let peer = self.peer(chat_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::NotFound(format!("peer {} not in session cache", chat_id)))?;
        Ok(peer_ref.into())
    }

    fn resolved(peer: &Peer) -> ResolvedChat {
        let record = mapper::chat_record(peer, None);
        ResolvedChat {
            id: record.id,
            title: record.title,
            is_forum: record.is_forum,
        }
    }
}

#[async_trait]
impl TgGateway for GrammersTgGateway {
    async fn get_dialogs(&self) -> Result<Vec<ChatRecord>, DomainError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut chats = Vec::new();
        let mut cache = HashMap::new();
        while let Some(dialog) = dialogs.next().await.map_err(invocation_to_domain)? {
            let peer = dialog.peer();
            let date = dialog.last_message.as_ref().map(|m| m.date());
            let record = mapper::chat_record(peer, date);
            cache.insert(record.id, peer.clone());
            chats.push(record);
        }
        self.peer_cache.lock().await.extend(cache);
        debug!(count = chats.len(), "dialogs fetched");
        Ok(chats)
    }

    async fn resolve_username(&self, username: &str) -> Result<ResolvedChat, DomainError> {
        let peer = self
            .client
            .resolve_username(username)
            .await
            .map_err(invocation_to_domain)?
            .ok_or_else(|| DomainError::NotFound(format!("@{}", username)))?;
        let chat = Self::resolved(&peer);
        self.peer_cache.lock().await.insert(chat.id, peer);
        Ok(chat)
    }

    async fn resolve_id(&self, chat_id: i64) -> Result<ResolvedChat, DomainError> {
        let peer = self.peer(chat_id).await?;
        Ok(Self::resolved(&peer))
    }

    async fn get_forum_topics(
        &self,
        chat: &ResolvedChat,
        limit: i32,
    ) -> Result<Vec<TopicRecord>, DomainError> {
        let channel = match self.input_peer(chat.id).await? {
            tl::enums::InputPeer::Channel(c) => {
                tl::enums::InputChannel::Channel(tl::types::InputChannel {
                    channel_id: c.channel_id,
                    access_hash: c.access_hash,
                })
            }
            _ => {
                return Err(DomainError::TgGateway(format!(
                    "chat {} is not a channel",
                    chat.id
                )));
            }
        };
        let req = tl::functions::channels::GetForumTopics {
            channel,
            q: None,
            offset_date: 0,
            offset_id: 0,
            offset_topic: 0,
            limit,
        };
        let tl::enums::messages::ForumTopics::Topics(res) = self.invoke(&req).await?;
        Ok(res
            .topics
            .iter()
            .filter_map(mapper::topic_to_domain)
            .collect())
    }

    async fn get_history(
        &self,
        chat: &ResolvedChat,
        offset_id: i32,
        limit: i32,
    ) -> Result<Vec<MediaMessage>, DomainError> {
        use tl::enums::messages::Messages;

        if let Some(ms) = self.export_delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let req = tl::functions::messages::GetHistory {
            peer: self.input_peer(chat.id).await?,
            offset_id,
            offset_date: 0,
            add_offset: 0,
            limit,
            max_id: 0,
            min_id: 0,
            hash: 0,
        };
        let messages = match self.invoke(&req).await? {
            Messages::Messages(m) => m.messages,
            Messages::Slice(m) => m.messages,
            Messages::ChannelMessages(m) => m.messages,
            Messages::NotModified(_) => return Ok(vec![]),
        };
        Ok(messages.iter().filter_map(mapper::message_to_domain).collect())
    }

    async fn download_media(
        &self,
        chat: &ResolvedChat,
        message: &MediaMessage,
        dest_path: &Path,
    ) -> Result<(), DomainError> {
        let peer = self.peer(chat.id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Media("peer not in session cache".into()))?;

        let messages = self
            .client
            .get_messages_by_id(peer_ref, &[message.id])
            .await
            .map_err(|e| DomainError::Media(e.to_string()))?;

        let msg = messages
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| DomainError::Media(format!("message {} not found", message.id)))?;

        let media = msg
            .media()
            .ok_or_else(|| DomainError::Media("message has no media".into()))?;

        self.client
            .download_media(&media, dest_path)
            .await
            .map_err(|e| DomainError::Media(e.to_string()))?;

        debug!(
            chat_id = chat.id,
            msg_id = message.id,
            path = %dest_path.display(),
            "media downloaded"
        );
        Ok(())
    }
}
