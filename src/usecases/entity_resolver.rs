//! Resolve a chat record to a live handle.
//!
//! Order: username (if any), then numeric id. Username lookup works even when the session
//! lacks the access hash needed for id lookup, which is common for chats missing from the
//! most recent dialog listing.

use crate::domain::{ChatRecord, ResolvedChat};
use crate::ports::TgGateway;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    Username,
    Id,
}

/// One lookup attempt and its outcome, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveAttempt {
    pub strategy: ResolveStrategy,
    /// `None` on success, the error text otherwise.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        chat: ResolvedChat,
        attempts: Vec<ResolveAttempt>,
    },
    NotFound {
        attempts: Vec<ResolveAttempt>,
    },
}

impl Resolution {
    pub fn attempts(&self) -> &[ResolveAttempt] {
        match self {
            Resolution::Resolved { attempts, .. } | Resolution::NotFound { attempts } => attempts,
        }
    }
}

pub struct EntityResolver {
    tg: Arc<dyn TgGateway>,
}

impl EntityResolver {
    pub fn new(tg: Arc<dyn TgGateway>) -> Self {
        Self { tg }
    }

    /// Try each strategy in order and stop at the first success. Never fails.
    pub async fn resolve(&self, record: &ChatRecord) -> Resolution {
        let mut attempts = Vec::with_capacity(2);

        let username = record
            .username
            .as_deref()
            .map(|u| u.trim().trim_start_matches('@'))
            .filter(|u| !u.is_empty());
        if let Some(username) = username {
            match self.tg.resolve_username(username).await {
                Ok(chat) => {
                    debug!(chat_id = record.id, username, "resolved via username");
                    attempts.push(ResolveAttempt {
                        strategy: ResolveStrategy::Username,
                        error: None,
                    });
                    return Resolution::Resolved { chat, attempts };
                }
                Err(e) => {
                    warn!(chat_id = record.id, username, error = %e, "username lookup failed");
                    attempts.push(ResolveAttempt {
                        strategy: ResolveStrategy::Username,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        match self.tg.resolve_id(record.id).await {
            Ok(chat) => {
                debug!(chat_id = record.id, "resolved via id");
                attempts.push(ResolveAttempt {
                    strategy: ResolveStrategy::Id,
                    error: None,
                });
                Resolution::Resolved { chat, attempts }
            }
            Err(e) => {
                warn!(chat_id = record.id, error = %e, "id lookup failed");
                attempts.push(ResolveAttempt {
                    strategy: ResolveStrategy::Id,
                    error: Some(e.to_string()),
                });
                Resolution::NotFound { attempts }
            }
        }
    }
}
