//! Media export: resolve chats, discover forum topics, walk history, download into the tree.
//!
//! - Chats run one after another, messages one after another (the API tolerates ~1 request in flight)
//! - A failed chat (not found, no read access, directory setup) never stops the batch
//! - A failed message never stops its chat
//! - Nothing is retried and nothing is deduplicated across runs

use crate::adapters::persistence::{DownloadLog, LogEntry};
use crate::domain::media::{self, chat_root, media_filename, MediaDirs, DOWNLOAD_LOG_FILE};
use crate::domain::{
    BatchResult, ChatRecord, DomainError, ExportResult, MediaMessage, ResolvedChat,
};
use crate::ports::TgGateway;
use crate::usecases::entity_resolver::{EntityResolver, Resolution};
use crate::usecases::topic_resolver::ForumTopicResolver;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Messages requested per history page.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Export service. Owns the resolvers and the exports root.
pub struct ExportService {
    tg: Arc<dyn TgGateway>,
    resolver: EntityResolver,
    topics: ForumTopicResolver,
    exports_root: PathBuf,
    show_progress: bool,
}

impl ExportService {
    pub fn new(tg: Arc<dyn TgGateway>, exports_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: EntityResolver::new(Arc::clone(&tg)),
            topics: ForumTopicResolver::new(Arc::clone(&tg)),
            tg,
            exports_root: exports_root.into(),
            show_progress: false,
        }
    }

    /// Render a spinner with the running message count while a chat is exported.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn exports_root(&self) -> &Path {
        &self.exports_root
    }

    /// Export every chat in order. Failures are tallied, never propagated.
    ///
    /// A chat counts as succeeded when at least one file was downloaded and as failed when it
    /// could not be resolved, read, or set up on disk. Chats without media count as neither.
    pub async fn export_chats(&self, chats: &[ChatRecord], limit_per_chat: usize) -> BatchResult {
        let mut result = BatchResult::default();
        info!(chats = chats.len(), limit_per_chat, "starting export");

        for (i, record) in chats.iter().enumerate() {
            info!(
                chat_id = record.id,
                title = %record.title,
                kind = record.chat_type.as_str(),
                "processing chat {}/{}",
                i + 1,
                chats.len()
            );

            let chat = match self.resolver.resolve(record).await {
                Resolution::Resolved { chat, .. } => chat,
                Resolution::NotFound { attempts } => {
                    error!(
                        chat_id = record.id,
                        title = %record.title,
                        attempts = attempts.len(),
                        "could not access chat"
                    );
                    result.failed += 1;
                    continue;
                }
            };

            if let Err(e) = self.check_read_access(&chat).await {
                error!(chat_id = chat.id, error = %e, "no permission to read history");
                result.failed += 1;
                continue;
            }

            match self.export_chat(&chat, limit_per_chat).await {
                Ok(stats) if stats.downloaded_count > 0 => {
                    info!(chat_id = chat.id, downloaded = stats.downloaded_count, "chat done");
                    result.succeeded += 1;
                }
                Ok(_) => info!(chat_id = chat.id, "no media found in chat"),
                Err(e) => {
                    error!(chat_id = chat.id, error = %e, "chat export aborted");
                    result.failed += 1;
                }
            }
        }

        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            attempted = chats.len(),
            "export finished"
        );
        result
    }

    /// Probe read permission by fetching a single history item.
    async fn check_read_access(&self, chat: &ResolvedChat) -> Result<(), DomainError> {
        match self.tg.get_history(chat, 0, 1).await {
            Ok(_) => {
                debug!(chat_id = chat.id, "read permission confirmed");
                Ok(())
            }
            Err(DomainError::NoReadAccess(reason)) => Err(DomainError::NoReadAccess(reason)),
            Err(e) => Err(DomainError::NoReadAccess(e.to_string())),
        }
    }

    /// Export up to `limit` messages of one resolved chat.
    ///
    /// Directory setup, log opening and history paging errors abort the chat; files already
    /// written stay. Per-message download failures are logged and skipped.
    pub async fn export_chat(
        &self,
        chat: &ResolvedChat,
        limit: usize,
    ) -> Result<ExportResult, DomainError> {
        info!(chat_id = chat.id, title = %chat.title, "downloading media");

        let topics = self.topics.resolve(chat).await;
        let is_forum = !topics.is_empty();

        let base_dir = chat_root(&self.exports_root, &chat.title, chat.id);
        let root_dirs = MediaDirs::new(&base_dir, None);
        create_dirs(&root_dirs).await?;

        let mut topic_dirs: BTreeMap<i32, MediaDirs> = BTreeMap::new();
        for (topic_id, title) in &topics {
            let dirs = MediaDirs::new(&base_dir, Some(title));
            create_dirs(&dirs).await?;
            topic_dirs.insert(*topic_id, dirs);
        }
        info!(path = %base_dir.display(), topics = topics.len(), "directory tree ready");

        let mut log = DownloadLog::open(base_dir.join(DOWNLOAD_LOG_FILE)).await?;
        let progress = self.progress_bar(&chat.title);
        let mut stats = ExportResult::default();
        let mut offset_id = 0;

        'pages: while stats.processed_count < limit {
            let page_size = (limit - stats.processed_count).min(HISTORY_PAGE_SIZE);
            let page = match self
                .tg
                .get_history(chat, offset_id, i32::try_from(page_size).unwrap_or(i32::MAX))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    progress.abandon();
                    warn!(chat_id = chat.id, offset_id, error = %e, "history page failed");
                    return Err(e);
                }
            };
            let Some(last) = page.last() else {
                break;
            };
            offset_id = last.id;

            for message in &page {
                if stats.processed_count >= limit {
                    break 'pages;
                }
                stats.processed_count += 1;
                progress.inc(1);

                if message.media.is_none() {
                    continue;
                }

                let topic = if is_forum {
                    message
                        .thread_top_id
                        .and_then(|top| topics.get(&top).map(|title| (top, title.as_str())))
                } else {
                    None
                };
                let dirs = topic
                    .and_then(|(id, _)| topic_dirs.get(&id))
                    .unwrap_or(&root_dirs);
                let topic_title = topic.map(|(_, title)| title);
                if let Some(title) = topic_title {
                    stats.per_topic.entry(title.to_string()).or_insert(0);
                }

                match self
                    .download_one(chat, message, dirs, topic_title, &mut log)
                    .await
                {
                    Ok(()) => {
                        stats.downloaded_count += 1;
                        if let Some(title) = topic_title {
                            *stats.per_topic.entry(title.to_string()).or_insert(0) += 1;
                        }
                    }
                    Err(e) => {
                        warn!(
                            chat_id = chat.id,
                            msg_id = message.id,
                            error = %e,
                            "media download failed"
                        );
                    }
                }
            }
        }

        progress.finish_and_clear();
        info!(
            chat_id = chat.id,
            processed = stats.processed_count,
            downloaded = stats.downloaded_count,
            path = %base_dir.display(),
            "chat export complete"
        );
        for (topic, count) in &stats.per_topic {
            info!(chat_id = chat.id, topic = %topic, files = count, "downloads per topic");
        }
        Ok(stats)
    }

    /// Classify, name, download and log a single message's media.
    ///
    /// Only the download decides the outcome; a log write failure after a completed download is
    /// logged and the file still counts.
    async fn download_one(
        &self,
        chat: &ResolvedChat,
        message: &MediaMessage,
        dirs: &MediaDirs,
        topic: Option<&str>,
        log: &mut DownloadLog,
    ) -> Result<(), DomainError> {
        let Some(payload) = &message.media else {
            return Err(DomainError::Media("message has no media".into()));
        };
        let kind = media::classify(payload);
        let filename = media_filename(message, topic);
        let path = dirs.dir_for(kind).join(&filename);

        debug!(chat_id = chat.id, msg_id = message.id, file = %filename, "downloading");
        self.tg.download_media(chat, message, &path).await?;

        let entry = LogEntry {
            filename: &filename,
            kind,
            message_id: message.id,
            message_date: message.date,
            topic,
        };
        if let Err(e) = log.record(&entry).await {
            warn!(
                chat_id = chat.id,
                msg_id = message.id,
                path = %log.path().display(),
                error = %e,
                "download log write failed"
            );
        }
        Ok(())
    }

    fn progress_bar(&self, title: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        let template = "{spinner} {msg}: {pos} messages ({elapsed})";
        if let Ok(style) = ProgressStyle::with_template(template) {
            pb.set_style(style);
        }
        pb.set_message(title.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

async fn create_dirs(dirs: &MediaDirs) -> Result<(), DomainError> {
    for path in dirs.paths() {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| DomainError::Directory(format!("{}: {}", path.display(), e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockChat, MockTgGateway};
    use crate::domain::MediaPayload;
    use std::fs;

    fn service(tg: MockTgGateway, root: &Path) -> (Arc<MockTgGateway>, ExportService) {
        let tg = Arc::new(tg);
        let svc = ExportService::new(tg.clone(), root);
        (tg, svc)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .map(|rd| {
                rd.filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_forum_messages_routed_by_topic() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChat::new(-100500, "Dev Forum")
            .forum()
            .topic(10, "General")
            .topic(20, "Releases")
            .thread_media(11, 10, MediaPayload::Photo)
            .thread_media(21, 20, MediaPayload::Video)
            .thread_media(31, 999, MediaPayload::Document {
                file_name: Some("notes.txt".into()),
            });
        let record = chat.record().clone();
        let (_, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());

        let batch = svc.export_chats(&[record], 100).await;
        assert_eq!(batch, BatchResult { succeeded: 1, failed: 0 });

        let base = dir.path().join("Dev Forum_-100500");
        assert_eq!(
            files_in(&base.join("General").join("photo")),
            vec!["[General]_20240102_030416_msg11.jpg"]
        );
        assert_eq!(
            files_in(&base.join("Releases").join("video")),
            vec!["[Releases]_20240102_030426_msg21.mp4"]
        );
        assert_eq!(
            files_in(&base.join("document")),
            vec!["20240102_030436_msg31.txt"]
        );
        // Every topic gets the full set of type directories up front.
        assert_eq!(files_in(&base.join("Releases")).len(), 7);

        let log = fs::read_to_string(base.join(DOWNLOAD_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_per_topic_counts() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChat::new(7, "Forum")
            .forum()
            .topic(1, "General")
            .thread_media(2, 1, MediaPayload::Photo)
            .thread_media(3, 1, MediaPayload::Sticker)
            .thread_media(4, 1, MediaPayload::Voice)
            .fail_download(4);
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(7).await.unwrap();

        let stats = svc.export_chat(&resolved, 100).await.unwrap();
        assert_eq!(stats.processed_count, 3);
        assert_eq!(stats.downloaded_count, 2);
        assert_eq!(stats.per_topic.get("General"), Some(&2));
    }

    #[tokio::test]
    async fn test_non_forum_ignores_thread_ids() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChat::new(5, "Flat").thread_media(2, 1, MediaPayload::Audio);
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(5).await.unwrap();

        let stats = svc.export_chat(&resolved, 10).await.unwrap();
        assert!(stats.per_topic.is_empty());
        assert_eq!(
            files_in(&dir.path().join("Flat_5").join("audio")),
            vec!["20240102_030407_msg2.mp3"]
        );
    }

    #[tokio::test]
    async fn test_message_without_media_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChat::new(9, "Mixed")
            .text(1)
            .media(2, MediaPayload::Photo)
            .text(3);
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(9).await.unwrap();

        let stats = svc.export_chat(&resolved, 100).await.unwrap();
        assert_eq!(stats.processed_count, 3);
        assert_eq!(stats.downloaded_count, 1);
    }

    #[tokio::test]
    async fn test_download_failure_does_not_stop_chat() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChat::new(3, "Flaky")
            .media(1, MediaPayload::Photo)
            .media(2, MediaPayload::Photo)
            .media(3, MediaPayload::Photo)
            .fail_download(2);
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(3).await.unwrap();

        let stats = svc.export_chat(&resolved, 100).await.unwrap();
        assert_eq!(stats.downloaded_count, 2);
        assert_eq!(files_in(&dir.path().join("Flaky_3").join("photo")).len(), 2);
        let log = fs::read_to_string(dir.path().join("Flaky_3").join(DOWNLOAD_LOG_FILE)).unwrap();
        assert!(!log.contains("msg2.jpg"));
    }

    #[tokio::test]
    async fn test_limit_spans_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut chat = MockChat::new(1, "Busy");
        for id in 1..=250 {
            chat = chat.media(id, MediaPayload::Sticker);
        }
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(1).await.unwrap();

        let stats = svc.export_chat(&resolved, 230).await.unwrap();
        assert_eq!(stats.processed_count, 230);
        assert_eq!(stats.downloaded_count, 230);
        // Newest first: messages 21..=250 were taken.
        let stickers = files_in(&dir.path().join("Busy_1").join("sticker"));
        assert!(stickers.iter().any(|f| f.ends_with("_msg21.webp")));
        assert!(!stickers.iter().any(|f| f.ends_with("_msg20.webp")));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let ok1 = MockChat::new(1, "First").media(1, MediaPayload::Photo);
        let missing = MockChat::new(2, "Second").media(1, MediaPayload::Photo).unresolvable();
        let ok3 = MockChat::new(3, "Third").media(1, MediaPayload::Video);
        let records = vec![ok1.record().clone(), missing.record().clone(), ok3.record().clone()];
        let (_, svc) = service(
            MockTgGateway::new().with_chat(ok1).with_chat(missing).with_chat(ok3),
            dir.path(),
        );

        let batch = svc.export_chats(&records, 50).await;
        assert_eq!(batch, BatchResult { succeeded: 2, failed: 1 });
        assert!(dir.path().join("First_1").join("photo").is_dir());
        assert!(!dir.path().join("Second_2").exists());
        assert!(dir.path().join("Third_3").join("video").is_dir());
    }

    #[tokio::test]
    async fn test_denied_history_and_empty_chats() {
        let dir = tempfile::tempdir().unwrap();
        let denied = MockChat::new(1, "Private").media(1, MediaPayload::Photo).deny_history();
        let empty = MockChat::new(2, "Quiet").text(1);
        let records = vec![denied.record().clone(), empty.record().clone()];
        let (_, svc) = service(MockTgGateway::new().with_chat(denied).with_chat(empty), dir.path());

        let batch = svc.export_chats(&records, 50).await;
        assert_eq!(batch, BatchResult { succeeded: 0, failed: 1 });
        assert!(!dir.path().join("Private_1").exists());
        assert!(dir.path().join("Quiet_2").join("other").is_dir());
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_only_that_chat() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the chat root should go.
        fs::write(dir.path().join("Blocked_1"), b"").unwrap();
        let blocked = MockChat::new(1, "Blocked").media(1, MediaPayload::Photo);
        let fine = MockChat::new(2, "Fine").media(1, MediaPayload::Photo);
        let records = vec![blocked.record().clone(), fine.record().clone()];
        let (_, svc) = service(MockTgGateway::new().with_chat(blocked).with_chat(fine), dir.path());

        let batch = svc.export_chats(&records, 50).await;
        assert_eq!(batch, BatchResult { succeeded: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_unopenable_log_is_directory_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should go.
        fs::create_dir_all(dir.path().join("Logless_4").join(DOWNLOAD_LOG_FILE)).unwrap();
        let chat = MockChat::new(4, "Logless").media(1, MediaPayload::Photo);
        let (tg, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());
        let resolved = tg.resolve_id(4).await.unwrap();

        let err = svc.export_chat(&resolved, 10).await.unwrap_err();
        assert!(matches!(err, DomainError::Directory(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_log_write_failure_keeps_download_counted() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("Full_6");
        fs::create_dir_all(&base).unwrap();
        // Every write to /dev/full fails with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", base.join(DOWNLOAD_LOG_FILE)).unwrap();
        let chat = MockChat::new(6, "Full").media(1, MediaPayload::Photo);
        let record = chat.record().clone();
        let (_, svc) = service(MockTgGateway::new().with_chat(chat), dir.path());

        let batch = svc.export_chats(&[record], 10).await;
        assert_eq!(batch, BatchResult { succeeded: 1, failed: 0 });
        assert_eq!(files_in(&base.join("photo")), vec!["20240102_030406_msg1.jpg"]);
    }
}
