//! Application configuration. API credentials, paths, export limits.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_SESSION_PATH: &str = "./telegram_export.session";
pub const DEFAULT_EXPORTS_DIR: &str = "exports";
pub const DEFAULT_LIMIT_PER_CHAT: usize = 1000;
pub const DEFAULT_QR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QR_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub session_path: Option<String>,
    /// Root of the export tree. Read from TG_EXPORT_EXPORTS_DIR.
    #[serde(default)]
    pub exports_dir: Option<String>,

    /// Max messages walked per chat. Read from TG_EXPORT_LIMIT_PER_CHAT.
    #[serde(default)]
    pub limit_per_chat: Option<usize>,

    /// Seconds to wait for a QR scan before the token is regenerated.
    #[serde(default)]
    pub qr_timeout_secs: Option<u64>,

    /// QR tokens issued before login gives up.
    #[serde(default)]
    pub qr_max_attempts: Option<u32>,

    /// Optional delay in ms before each message-history request (rate limiting). Read from EXPORT_DELAY_MS.
    #[serde(default)]
    pub export_delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("TG_EXPORT"));
        if let Ok(path) = std::env::var("TG_EXPORT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg = Self::from_builder(c)?;
        // EXPORT_DELAY_MS is read directly (no prefix) so .env can use EXPORT_DELAY_MS=500
        if let Ok(s) = std::env::var("EXPORT_DELAY_MS") {
            if let Ok(ms) = s.parse::<u64>() {
                cfg.export_delay_ms = Some(ms);
            }
        }
        Ok(cfg)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// API credentials, or a message pointing at where to get them.
    pub fn credentials(&self) -> Result<(i32, String), String> {
        match (self.api_id, self.api_hash.as_deref()) {
            (Some(id), Some(hash)) if id != 0 && !hash.trim().is_empty() => {
                Ok((id, hash.trim().to_string()))
            }
            _ => Err(
                "Set TG_EXPORT_API_ID and TG_EXPORT_API_HASH (env or .env). Get them from https://my.telegram.org"
                    .to_string(),
            ),
        }
    }

    pub fn session_path_or_default(&self) -> PathBuf {
        PathBuf::from(self.session_path.as_deref().unwrap_or(DEFAULT_SESSION_PATH))
    }

    pub fn exports_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.exports_dir.as_deref().unwrap_or(DEFAULT_EXPORTS_DIR))
    }

    pub fn limit_per_chat_or_default(&self) -> usize {
        self.limit_per_chat.unwrap_or(DEFAULT_LIMIT_PER_CHAT)
    }

    pub fn qr_timeout_secs_or_default(&self) -> u64 {
        self.qr_timeout_secs.unwrap_or(DEFAULT_QR_TIMEOUT_SECS)
    }

    pub fn qr_max_attempts_or_default(&self) -> u32 {
        self.qr_max_attempts.unwrap_or(DEFAULT_QR_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> AppConfig {
        AppConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse("");
        assert_eq!(cfg.session_path_or_default(), PathBuf::from(DEFAULT_SESSION_PATH));
        assert_eq!(cfg.exports_dir_or_default(), PathBuf::from("exports"));
        assert_eq!(cfg.limit_per_chat_or_default(), 1000);
        assert_eq!(cfg.qr_timeout_secs_or_default(), 30);
        assert_eq!(cfg.qr_max_attempts_or_default(), 5);
        assert!(cfg.credentials().is_err());
    }

    #[test]
    fn test_values_from_file() {
        let cfg = parse(
            r#"
            api_id = 12345
            api_hash = "abcdef"
            exports_dir = "/tmp/out"
            limit_per_chat = 50
            export_delay_ms = 250
            "#,
        );
        assert_eq!(cfg.credentials().unwrap(), (12345, "abcdef".to_string()));
        assert_eq!(cfg.exports_dir_or_default(), PathBuf::from("/tmp/out"));
        assert_eq!(cfg.limit_per_chat_or_default(), 50);
        assert_eq!(cfg.export_delay_ms, Some(250));
    }

    #[test]
    fn test_blank_hash_rejected() {
        let cfg = parse("api_id = 1\napi_hash = \"  \"");
        let err = cfg.credentials().unwrap_err();
        assert!(err.contains("my.telegram.org"));
    }
}
