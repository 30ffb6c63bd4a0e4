//! List all dialogs and snapshot them to the chat listing file.

use crate::domain::{ChatRecord, DomainError};
use crate::ports::{ChatListPort, TgGateway};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ChatDirectoryService {
    tg: Arc<dyn TgGateway>,
    store: Arc<dyn ChatListPort>,
}

impl ChatDirectoryService {
    pub fn new(tg: Arc<dyn TgGateway>, store: Arc<dyn ChatListPort>) -> Self {
        Self { tg, store }
    }

    /// Fetch dialogs, drop duplicate ids, write the snapshot and return the listing.
    pub async fn export_chat_list(&self) -> Result<Vec<ChatRecord>, DomainError> {
        info!("exporting chat list");
        let dialogs = self.tg.get_dialogs().await?;

        let mut seen = HashSet::with_capacity(dialogs.len());
        let total = dialogs.len();
        let chats: Vec<ChatRecord> = dialogs.into_iter().filter(|c| seen.insert(c.id)).collect();
        if chats.len() < total {
            warn!(duplicates = total - chats.len(), "dialog listing contained duplicate ids");
        }

        self.store.save(&chats).await?;
        info!(count = chats.len(), "chat list exported");
        Ok(chats)
    }

    /// Last written snapshot.
    pub async fn load_snapshot(&self) -> Result<Vec<ChatRecord>, DomainError> {
        self.store.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockChat, MockTgGateway};
    use crate::adapters::persistence::ChatListJson;

    #[tokio::test]
    async fn test_snapshot_matches_listing() {
        let dir = tempfile::tempdir().unwrap();
        let tg = Arc::new(
            MockTgGateway::new()
                .with_chat(MockChat::new(1, "Один").username("one"))
                .with_chat(MockChat::new(2, "Forum").forum())
                .with_chat(MockChat::new(1, "Duplicate")),
        );
        let store = Arc::new(ChatListJson::in_dir(dir.path()));
        let svc = ChatDirectoryService::new(tg, store);

        let chats = svc.export_chat_list().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].title, "Один");
        assert_eq!(svc.load_snapshot().await.unwrap(), chats);
    }
}
