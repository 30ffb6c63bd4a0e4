//! Local persistence: chat listing snapshot and per-chat download logs.

pub mod chat_list_json;
pub mod download_log;

pub use chat_list_json::{ChatListJson, CHAT_LIST_FILE};
pub use download_log::{DownloadLog, LogEntry};
