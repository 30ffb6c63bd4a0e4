//! Media classification, file naming and the on-disk directory layout.
//!
//! Layout per chat: `<root>/<Title>_<id>/[<Topic>/]<kind>/<file>`.

use crate::domain::{MediaKind, MediaMessage, MediaPayload};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Characters rejected by common filesystems.
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length (in characters) of a sanitized path segment.
pub const MAX_SEGMENT_LEN: usize = 200;

const FALLBACK_SEGMENT: &str = "unnamed";
const GENERIC_EXTENSION: &str = ".bin";

/// Name of the per-chat append-only log.
pub const DOWNLOAD_LOG_FILE: &str = "download_log.txt";

/// Make `name` safe to use as a single path segment.
///
/// Replaces `<>:"/\|?*` with `_`, trims spaces and dots at both ends, substitutes `unnamed`
/// for an empty result and truncates to [`MAX_SEGMENT_LEN`] characters.
pub fn sanitize_segment(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return FALLBACK_SEGMENT.to_string();
    }
    trimmed.chars().take(MAX_SEGMENT_LEN).collect()
}

/// Map a media payload to its type tag.
pub fn classify(payload: &MediaPayload) -> MediaKind {
    match payload {
        MediaPayload::Photo => MediaKind::Photo,
        MediaPayload::Video => MediaKind::Video,
        MediaPayload::Voice => MediaKind::Voice,
        MediaPayload::Audio => MediaKind::Audio,
        MediaPayload::Sticker => MediaKind::Sticker,
        MediaPayload::Document { .. } => MediaKind::Document,
        MediaPayload::Other => MediaKind::Other,
    }
}

/// File extension (with leading dot) for a payload.
///
/// Documents keep the extension of their original file name when it has one.
pub fn file_extension(payload: &MediaPayload) -> String {
    match payload {
        MediaPayload::Photo => ".jpg".to_string(),
        MediaPayload::Video => ".mp4".to_string(),
        MediaPayload::Voice => ".ogg".to_string(),
        MediaPayload::Audio => ".mp3".to_string(),
        MediaPayload::Sticker => ".webp".to_string(),
        MediaPayload::Document { file_name } => file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .map(|ext| ext.to_string_lossy())
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                let clean: String = ext
                    .chars()
                    .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
                    .collect();
                format!(".{}", clean)
            })
            .unwrap_or_else(|| GENERIC_EXTENSION.to_string()),
        MediaPayload::Other => GENERIC_EXTENSION.to_string(),
    }
}

/// File name for a message's media: `[<Topic>]_YYYYMMDD_HHMMSS_msg<id><ext>`.
/// The topic prefix is omitted when `topic` is `None`.
pub fn media_filename(message: &MediaMessage, topic: Option<&str>) -> String {
    let prefix = topic
        .map(|t| format!("[{}]_", sanitize_segment(t)))
        .unwrap_or_default();
    let timestamp = message.date.format("%Y%m%d_%H%M%S");
    let extension = message
        .media
        .as_ref()
        .map(file_extension)
        .unwrap_or_else(|| GENERIC_EXTENSION.to_string());
    format!("{}{}_msg{}{}", prefix, timestamp, message.id, extension)
}

/// Root directory of a chat's export: `<exports_root>/<SanitizedTitle>_<id>`.
pub fn chat_root(exports_root: &Path, title: &str, chat_id: i64) -> PathBuf {
    exports_root.join(format!("{}_{}", sanitize_segment(title), chat_id))
}

/// One directory per media kind, either at the chat root or under a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDirs {
    dirs: BTreeMap<MediaKind, PathBuf>,
}

impl MediaDirs {
    pub fn new(chat_root: &Path, topic: Option<&str>) -> Self {
        let base = match topic {
            Some(t) => chat_root.join(sanitize_segment(t)),
            None => chat_root.to_path_buf(),
        };
        let dirs = MediaKind::ALL
            .iter()
            .map(|kind| (*kind, base.join(kind.as_str())))
            .collect();
        Self { dirs }
    }

    /// Target directory for `kind`, falling back to the `other` directory.
    pub fn dir_for(&self, kind: MediaKind) -> &Path {
        self.dirs
            .get(&kind)
            .or_else(|| self.dirs.get(&MediaKind::Other))
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.dirs.values().map(PathBuf::as_path)
    }
}
