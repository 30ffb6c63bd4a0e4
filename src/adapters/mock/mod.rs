//! In-memory adapters for testing without a Telegram connection.

mod auth;
mod gateway;

pub use auth::MockAuthAdapter;
pub use gateway::{mock_message, MockChat, MockTgGateway};
