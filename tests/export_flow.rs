//! End-to-end flow over the in-memory adapters: login, listing, export.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tg_export::adapters::mock::{MockAuthAdapter, MockChat, MockTgGateway};
use tg_export::adapters::persistence::ChatListJson;
use tg_export::domain::{LoginPoll, MediaPayload};
use tg_export::ports::{ChatDescriptor, ChatListPort, ExportSummary, ExporterApi};
use tg_export::usecases::{AuthSession, ChatDirectoryService, ExportService, ExporterApp};

fn build_app(tg: MockTgGateway, auth: Arc<MockAuthAdapter>, root: &Path) -> ExporterApp {
    let tg = Arc::new(tg);
    ExporterApp::new(
        AuthSession::new(auth),
        ChatDirectoryService::new(tg.clone(), Arc::new(ChatListJson::in_dir(root))),
        ExportService::new(tg, root),
    )
    .with_poll_timeout(Duration::ZERO)
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else if path.file_name().is_some_and(|n| n == "download_log.txt") {
                0
            } else {
                1
            }
        })
        .sum()
}

fn descriptor(id: i64) -> ChatDescriptor {
    ChatDescriptor { id, username: None }
}

fn sample_gateway() -> MockTgGateway {
    MockTgGateway::new()
        .with_chat(
            MockChat::new(-1001, "Photos")
                .username("photos")
                .media(1, MediaPayload::Photo)
                .text(2)
                .media(3, MediaPayload::Video),
        )
        .with_chat(
            MockChat::new(-1002, "Private Club")
                .username("club")
                .unresolvable()
                .media(1, MediaPayload::Photo),
        )
        .with_chat(
            MockChat::new(-1003, "Dev Forum")
                .forum()
                .topic(10, "General")
                .topic(20, "Releases")
                .thread_media(11, 10, MediaPayload::Photo)
                .thread_media(21, 20, MediaPayload::Document {
                    file_name: Some("v1.2.tar.gz".into()),
                })
                .thread_media(31, 77, MediaPayload::Voice),
        )
}

#[tokio::test]
async fn qr_login_then_export_batch() {
    let dir = tempfile::tempdir().unwrap();
    let auth = Arc::new(MockAuthAdapter::new().with_polls([LoginPoll::Pending, LoginPoll::Accepted]));
    let app = build_app(sample_gateway(), auth.clone(), dir.path());

    let started = app.start_auth().await.unwrap();
    assert!(!started.authorized);
    assert!(started.qr_url.unwrap().starts_with("tg://login?token="));

    // First poll times out and refreshes the token, second one is accepted.
    let first = app.poll_auth(None).await.unwrap();
    assert_eq!(first.detail.as_deref(), Some("expired"));
    let second = app.poll_auth(None).await.unwrap();
    assert!(second.authorized);
    assert_eq!(auth.tokens_issued(), 2);

    let chats = app.list_chats().await.unwrap();
    assert_eq!(chats.len(), 3);
    let snapshot = ChatListJson::in_dir(dir.path()).load().await.unwrap();
    assert_eq!(snapshot, chats);

    let summary = app
        .export_chats(vec![descriptor(-1001), descriptor(-1002), descriptor(-1003)], 100)
        .await
        .unwrap();
    assert_eq!(summary, ExportSummary { succeeded: 2, failed: 1 });

    assert_eq!(count_files(&dir.path().join("Photos_-1001")), 2);
    assert!(!dir.path().join("Private Club_-1002").exists());

    let forum = dir.path().join("Dev Forum_-1003");
    assert_eq!(count_files(&forum.join("General")), 1);
    assert_eq!(count_files(&forum.join("Releases")), 1);
    assert!(forum
        .join("Releases")
        .join("document")
        .join("[Releases]_20240102_030426_msg21.gz")
        .exists());
    // Unknown thread id lands in the chat's root set.
    assert_eq!(count_files(&forum.join("voice")), 1);

    let log = fs::read_to_string(forum.join("download_log.txt")).unwrap();
    assert_eq!(log.lines().count(), 3);
    assert!(log.lines().any(|l| l.ends_with(" - topic: General")));
}

#[tokio::test]
async fn login_gives_up_after_retry_cap() {
    let dir = tempfile::tempdir().unwrap();
    let auth = Arc::new(MockAuthAdapter::new());
    let app = build_app(MockTgGateway::new(), auth.clone(), dir.path());
    app.start_auth().await.unwrap();

    let mut expired = 0;
    let failed = loop {
        let polled = app.poll_auth(None).await.unwrap();
        match polled.detail.as_deref() {
            Some("expired") => expired += 1,
            _ => break polled,
        }
    };
    assert!(!failed.authorized);
    assert_eq!(expired, 4);
    assert_eq!(auth.tokens_issued(), 5);

    // Terminal: further polls do not issue tokens.
    let again = app.poll_auth(None).await.unwrap();
    assert_eq!(again.detail, failed.detail);
    assert_eq!(auth.tokens_issued(), 5);
    assert!(app.list_chats().await.is_err());
}

#[tokio::test]
async fn rerun_downloads_again() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = MockTgGateway::new().with_chat(
        MockChat::new(5, "Again").media(1, MediaPayload::Photo),
    );
    let app = build_app(gateway, Arc::new(MockAuthAdapter::authorized()), dir.path());
    app.start_auth().await.unwrap();

    for _ in 0..2 {
        let summary = app.export_chats(vec![descriptor(5)], 10).await.unwrap();
        assert_eq!(summary.succeeded, 1);
    }
    let log = fs::read_to_string(dir.path().join("Again_5").join("download_log.txt")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert_eq!(count_files(&dir.path().join("Again_5")), 1);
}
