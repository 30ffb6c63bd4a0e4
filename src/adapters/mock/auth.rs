//! Scripted AuthPort. Poll outcomes are consumed in order; an empty script means `Pending`.

use crate::domain::{DomainError, LoginPoll, QrToken};
use crate::ports::AuthPort;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct MockAuthAdapter {
    authorized: AtomicBool,
    polls: Mutex<VecDeque<LoginPoll>>,
    password: Option<String>,
    tokens_issued: AtomicU32,
}

impl MockAuthAdapter {
    /// Unauthorized session; the QR code is never scanned unless scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that is already authorized.
    pub fn authorized() -> Self {
        Self {
            authorized: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn with_polls(self, polls: impl IntoIterator<Item = LoginPoll>) -> Self {
        Self {
            polls: Mutex::new(polls.into_iter().collect()),
            ..self
        }
    }

    /// Cloud password accepted by `check_password`.
    pub fn with_password(self, password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..self
        }
    }

    pub fn tokens_issued(&self) -> u32 {
        self.tokens_issued.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthPort for MockAuthAdapter {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn export_login_token(&self) -> Result<QrToken, DomainError> {
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(QrToken {
            token: format!("mock-token-{}", n).into_bytes(),
            expires_at: None,
        })
    }

    async fn poll_login_token(&self) -> Result<LoginPoll, DomainError> {
        let next = self
            .polls
            .lock()
            .map_err(|_| DomainError::Auth("poll script poisoned".into()))?
            .pop_front()
            .unwrap_or(LoginPoll::Pending);
        if next == LoginPoll::Accepted {
            self.authorized.store(true, Ordering::SeqCst);
        }
        Ok(next)
    }

    async fn check_password(&self, password: &str) -> Result<(), DomainError> {
        match &self.password {
            Some(expected) if expected == password => {
                self.authorized.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(DomainError::Auth("PASSWORD_HASH_INVALID".into())),
        }
    }
}
