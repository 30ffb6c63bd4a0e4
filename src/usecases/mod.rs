//! Application use cases. Orchestrate domain logic via ports.

pub mod auth_session;
pub mod chat_directory;
pub mod entity_resolver;
pub mod export_service;
pub mod exporter_app;
pub mod topic_resolver;

pub use auth_session::{AuthSession, AuthState, AuthStatus};
pub use chat_directory::ChatDirectoryService;
pub use entity_resolver::{EntityResolver, Resolution};
pub use export_service::ExportService;
pub use exporter_app::ExporterApp;
pub use topic_resolver::ForumTopicResolver;
