//! Fetch the topic map of a forum chat.

use crate::domain::ResolvedChat;
use crate::ports::TgGateway;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Topics fetched per forum. Single page, no pagination.
pub const TOPICS_PAGE_LIMIT: i32 = 100;

pub struct ForumTopicResolver {
    tg: Arc<dyn TgGateway>,
}

impl ForumTopicResolver {
    pub fn new(tg: Arc<dyn TgGateway>) -> Self {
        Self { tg }
    }

    /// Topic id -> title. Empty for non-forum chats and on any failure.
    pub async fn resolve(&self, chat: &ResolvedChat) -> BTreeMap<i32, String> {
        if !chat.is_forum {
            return BTreeMap::new();
        }
        match self.tg.get_forum_topics(chat, TOPICS_PAGE_LIMIT).await {
            Ok(topics) => {
                let map: BTreeMap<i32, String> =
                    topics.into_iter().map(|t| (t.id, t.title)).collect();
                info!(chat_id = chat.id, topics = map.len(), "forum topics found");
                for (id, title) in &map {
                    info!(chat_id = chat.id, topic_id = id, topic = %title, "topic");
                }
                map
            }
            Err(e) => {
                warn!(chat_id = chat.id, error = %e, "failed to fetch forum topics, exporting flat");
                BTreeMap::new()
            }
        }
    }
}
