//! Application facade. Implements the inbound `ExporterApi` over the use cases.
//!
//! Owns the auth session and remembers the last chat listing so export requests that only
//! carry an id or a username can be matched back to a full record.

use crate::domain::{AuthError, ChatRecord, DomainError};
use crate::ports::inbound::{
    ChatDescriptor, ExportSummary, ExporterApi, PollAuthResponse, StartAuthResponse,
};
use crate::usecases::auth_session::{AuthSession, AuthState, AuthStatus};
use crate::usecases::chat_directory::ChatDirectoryService;
use crate::usecases::export_service::ExportService;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Default wait per `poll_auth` call.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ExporterApp {
    session: Mutex<AuthSession>,
    directory: ChatDirectoryService,
    exporter: ExportService,
    last_listing: RwLock<Vec<ChatRecord>>,
    poll_timeout: Duration,
}

impl ExporterApp {
    pub fn new(
        session: AuthSession,
        directory: ChatDirectoryService,
        exporter: ExportService,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            directory,
            exporter,
            last_listing: RwLock::new(Vec::new()),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    async fn ensure_authenticated(&self) -> Result<(), DomainError> {
        let session = self.session.lock().await;
        match session.state() {
            AuthState::Authenticated => Ok(()),
            AuthState::Disconnected => Err(DomainError::Auth(AuthError::NotStarted.detail())),
            AuthState::Failed { reason } => Err(DomainError::Auth(reason.clone())),
            AuthState::AwaitingScan { .. } | AuthState::TwoFactorRequired { .. } => {
                Err(DomainError::Auth("login not completed".into()))
            }
        }
    }

    /// Match descriptors against the last listing; synthesize the rest.
    async fn records_for(&self, chats: &[ChatDescriptor]) -> Vec<ChatRecord> {
        let listing = self.last_listing.read().await;
        chats
            .iter()
            .map(|d| match find_listed(&listing, d) {
                Some(record) => {
                    let mut record = record.clone();
                    if record.username.is_none() {
                        record.username = d.username.clone();
                    }
                    record
                }
                None => {
                    debug!(chat_id = d.id, "chat not in last listing, using placeholder record");
                    ChatRecord::synthetic(d.id, d.username.clone())
                }
            })
            .collect()
    }
}

fn find_listed<'a>(listing: &'a [ChatRecord], d: &ChatDescriptor) -> Option<&'a ChatRecord> {
    listing.iter().find(|c| c.id == d.id).or_else(|| {
        let wanted = d.username.as_deref()?.trim().trim_start_matches('@');
        listing.iter().find(|c| {
            c.username
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(wanted))
        })
    })
}

fn poll_response(status: AuthStatus) -> PollAuthResponse {
    PollAuthResponse {
        authorized: status.is_authenticated(),
        qr_url: status.qr_url().map(str::to_string),
        detail: status.error().map(|e| e.detail()),
    }
}

#[async_trait::async_trait]
impl ExporterApi for ExporterApp {
    async fn start_auth(&self) -> Result<StartAuthResponse, DomainError> {
        let status = self.session.lock().await.start().await?;
        Ok(StartAuthResponse {
            authorized: status.is_authenticated(),
            qr_url: status.qr_url().map(str::to_string),
        })
    }

    async fn poll_auth(&self, password: Option<String>) -> Result<PollAuthResponse, DomainError> {
        let mut session = self.session.lock().await;
        // Returns at once when the scan is done and only the password is missing.
        let status = session.poll(self.poll_timeout).await;
        // A password sent along with the poll completes the login in the same call.
        let status = match (status, password) {
            (AuthStatus::TwoFactorRequired { .. }, Some(password)) => {
                session.submit_password(&password).await
            }
            (status, _) => status,
        };
        Ok(poll_response(status))
    }

    async fn list_chats(&self) -> Result<Vec<ChatRecord>, DomainError> {
        self.ensure_authenticated().await?;
        let chats = self.directory.export_chat_list().await?;
        *self.last_listing.write().await = chats.clone();
        Ok(chats)
    }

    async fn export_chats(
        &self,
        chats: Vec<ChatDescriptor>,
        limit_per_chat: usize,
    ) -> Result<ExportSummary, DomainError> {
        self.ensure_authenticated().await?;
        let records = self.records_for(&chats).await;
        let batch = self.exporter.export_chats(&records, limit_per_chat).await;
        info!(succeeded = batch.succeeded, failed = batch.failed, "batch summary");
        Ok(ExportSummary {
            succeeded: batch.succeeded,
            failed: batch.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockAuthAdapter, MockChat, MockTgGateway};
    use crate::adapters::persistence::ChatListJson;
    use crate::domain::{ChatType, LoginPoll, MediaPayload};
    use std::path::Path;
    use std::sync::Arc;

    fn app(tg: MockTgGateway, auth: MockAuthAdapter, root: &Path) -> ExporterApp {
        let tg = Arc::new(tg);
        ExporterApp::new(
            AuthSession::new(Arc::new(auth)),
            ChatDirectoryService::new(tg.clone(), Arc::new(ChatListJson::in_dir(root))),
            ExportService::new(tg, root),
        )
        .with_poll_timeout(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(MockTgGateway::new(), MockAuthAdapter::new(), dir.path());

        let err = app.list_chats().await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(ref d) if d == "login_not_started"));

        let poll = app.poll_auth(None).await.unwrap();
        assert!(!poll.authorized);
        assert_eq!(poll.detail.as_deref(), Some("login_not_started"));
    }

    #[tokio::test]
    async fn test_two_factor_flow() {
        let dir = tempfile::tempdir().unwrap();
        let auth = MockAuthAdapter::new()
            .with_polls([LoginPoll::PasswordRequired { hint: None }])
            .with_password("hunter2");
        let app = app(MockTgGateway::new(), auth, dir.path());

        let started = app.start_auth().await.unwrap();
        assert!(!started.authorized);
        assert!(started.qr_url.is_some());

        let poll = app.poll_auth(None).await.unwrap();
        assert_eq!(poll.detail.as_deref(), Some("2fa_required"));

        // Asking again without a password keeps reporting the pending step.
        let poll = app.poll_auth(None).await.unwrap();
        assert_eq!(poll.detail.as_deref(), Some("2fa_required"));

        let poll = app.poll_auth(Some("hunter2".into())).await.unwrap();
        assert!(poll.authorized);
        assert_eq!(poll.detail, None);
    }

    #[tokio::test]
    async fn test_password_with_first_poll_completes_login() {
        let dir = tempfile::tempdir().unwrap();
        let auth = MockAuthAdapter::new()
            .with_polls([LoginPoll::PasswordRequired { hint: None }])
            .with_password("hunter2");
        let app = app(MockTgGateway::new(), auth, dir.path());
        app.start_auth().await.unwrap();

        let poll = app.poll_auth(Some("hunter2".into())).await.unwrap();
        assert!(poll.authorized);
        assert_eq!(poll.detail, None);
        assert!(app.list_chats().await.is_ok());
    }

    #[tokio::test]
    async fn test_password_ignored_while_awaiting_scan() {
        let dir = tempfile::tempdir().unwrap();
        let auth = MockAuthAdapter::new().with_password("hunter2");
        let app = app(MockTgGateway::new(), auth, dir.path());
        app.start_auth().await.unwrap();

        let poll = app.poll_auth(Some("hunter2".into())).await.unwrap();
        assert!(!poll.authorized);
        assert_eq!(poll.detail.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_expired_poll_returns_new_url() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(MockTgGateway::new(), MockAuthAdapter::new(), dir.path());

        let first = app.start_auth().await.unwrap().qr_url.unwrap();
        let poll = app.poll_auth(None).await.unwrap();
        assert_eq!(poll.detail.as_deref(), Some("expired"));
        assert_ne!(poll.qr_url.unwrap(), first);
    }

    #[tokio::test]
    async fn test_descriptors_enriched_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let tg = MockTgGateway::new()
            .with_chat(
                MockChat::new(-1001, "Listed")
                    .username("listed")
                    .media(1, MediaPayload::Photo),
            )
            .with_chat(MockChat::new(-1002, "Hidden").media(1, MediaPayload::Voice));
        let app = app(tg, MockAuthAdapter::authorized(), dir.path());
        app.start_auth().await.unwrap();
        app.list_chats().await.unwrap();

        let records = app
            .records_for(&[
                ChatDescriptor {
                    id: 0,
                    username: Some("@Listed".into()),
                },
                ChatDescriptor {
                    id: 555,
                    username: None,
                },
            ])
            .await;
        assert_eq!(records[0].id, -1001);
        assert_eq!(records[0].title, "Listed");
        assert_eq!(records[1].title, "Chat_555");
        assert_eq!(records[1].chat_type, ChatType::Unknown);
    }

    #[tokio::test]
    async fn test_synthetic_records_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let tg = MockTgGateway::new()
            .with_chat(MockChat::new(1, "Listed").media(1, MediaPayload::Photo));
        let app = app(tg, MockAuthAdapter::authorized(), dir.path());
        app.start_auth().await.unwrap();
        let listed = app.list_chats().await.unwrap();

        let summary = app
            .export_chats(
                vec![
                    ChatDescriptor {
                        id: 1,
                        username: None,
                    },
                    ChatDescriptor {
                        id: 99,
                        username: None,
                    },
                ],
                10,
            )
            .await
            .unwrap();
        assert_eq!(summary, ExportSummary { succeeded: 1, failed: 1 });

        let snapshot = ChatListJson::in_dir(dir.path());
        assert_eq!(crate::ports::ChatListPort::load(&snapshot).await.unwrap(), listed);
    }
}
