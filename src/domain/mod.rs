//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod media;

pub use entities::{
    placeholder_title, BatchResult, ChatRecord, ChatType, ExportResult, LoginPoll, MediaKind,
    MediaMessage, MediaPayload, QrToken, ResolvedChat, TopicRecord,
};
pub use errors::{AuthError, DomainError};
