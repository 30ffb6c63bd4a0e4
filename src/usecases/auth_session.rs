//! QR login state machine over the AuthPort.
//!
//! `Disconnected -> AwaitingScan -> {Authenticated | TwoFactorRequired | Failed}`, with
//! `Expired` as a transient poll outcome that regenerates the token and returns to
//! `AwaitingScan`. `Authenticated` and `Failed` are terminal.
//!
//! Methods take `&mut self`: one handshake per session, no concurrent pollers.

use crate::domain::{AuthError, DomainError, LoginPoll, QrToken};
use crate::ports::AuthPort;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default cap on QR token regenerations before the handshake fails.
pub const DEFAULT_MAX_QR_ATTEMPTS: u32 = 5;

/// Interval between checks of a pending token.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Disconnected,
    AwaitingScan { token: QrToken },
    TwoFactorRequired { hint: Option<String> },
    Authenticated,
    Failed { reason: String },
}

/// What a caller sees after `start`, `poll` or `submit_password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated,
    AwaitingScan { qr_url: String },
    /// The token expired and was replaced; show `qr_url` and poll again.
    Expired { qr_url: String },
    TwoFactorRequired { hint: Option<String> },
    Failed { reason: String },
    NotStarted,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated)
    }

    /// Error view of non-success statuses. `None` for `Authenticated` and `AwaitingScan`.
    pub fn error(&self) -> Option<AuthError> {
        match self {
            AuthStatus::Authenticated | AuthStatus::AwaitingScan { .. } => None,
            AuthStatus::Expired { .. } => Some(AuthError::Expired),
            AuthStatus::TwoFactorRequired { .. } => Some(AuthError::TwoFactorRequired),
            AuthStatus::Failed { reason } => Some(AuthError::Failed(reason.clone())),
            AuthStatus::NotStarted => Some(AuthError::NotStarted),
        }
    }

    /// QR URL to display, if the status carries one.
    pub fn qr_url(&self) -> Option<&str> {
        match self {
            AuthStatus::AwaitingScan { qr_url } | AuthStatus::Expired { qr_url } => Some(qr_url),
            _ => None,
        }
    }
}

/// Authentication session. Owned by the caller and kept for the lifetime of the client.
pub struct AuthSession {
    auth: Arc<dyn AuthPort>,
    state: AuthState,
    attempts: u32,
    max_attempts: u32,
}

impl AuthSession {
    pub fn new(auth: Arc<dyn AuthPort>) -> Self {
        Self::with_max_attempts(auth, DEFAULT_MAX_QR_ATTEMPTS)
    }

    pub fn with_max_attempts(auth: Arc<dyn AuthPort>, max_attempts: u32) -> Self {
        Self {
            auth,
            state: AuthState::Disconnected,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Number of token regenerations performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Check the stored session; issue a QR token if it is not authorized yet.
    ///
    /// Restarts the handshake (and the retry counter) unless the session is already authenticated.
    pub async fn start(&mut self) -> Result<AuthStatus, DomainError> {
        if self.state == AuthState::Authenticated {
            return Ok(AuthStatus::Authenticated);
        }
        if self.auth.is_authenticated().await? {
            info!("existing session found, already authorized");
            self.state = AuthState::Authenticated;
            return Ok(AuthStatus::Authenticated);
        }
        let token = self.auth.export_login_token().await?;
        let qr_url = token.url();
        info!("QR login token issued");
        self.attempts = 0;
        self.state = AuthState::AwaitingScan { token };
        Ok(AuthStatus::AwaitingScan { qr_url })
    }

    /// Wait up to `timeout` for the current token to be approved.
    ///
    /// The token is checked at least once even with a zero timeout. On expiry a new token is
    /// issued and `Expired` is returned; after `max_attempts` expiries the session fails.
    pub async fn poll(&mut self, timeout: Duration) -> AuthStatus {
        match &self.state {
            AuthState::Disconnected => return AuthStatus::NotStarted,
            AuthState::Authenticated => return AuthStatus::Authenticated,
            AuthState::Failed { reason } => {
                return AuthStatus::Failed {
                    reason: reason.clone(),
                };
            }
            AuthState::TwoFactorRequired { hint } => {
                return AuthStatus::TwoFactorRequired { hint: hint.clone() };
            }
            AuthState::AwaitingScan { .. } => {}
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.auth.poll_login_token().await {
                Ok(LoginPoll::Accepted) => {
                    info!("QR login accepted");
                    self.state = AuthState::Authenticated;
                    return AuthStatus::Authenticated;
                }
                Ok(LoginPoll::PasswordRequired { hint }) => {
                    info!("QR login accepted, two-factor password required");
                    self.state = AuthState::TwoFactorRequired { hint: hint.clone() };
                    return AuthStatus::TwoFactorRequired { hint };
                }
                Ok(LoginPoll::Pending) => {}
                Err(e) => {
                    warn!(error = %e, attempt = self.attempts + 1, "QR login check failed");
                    return self.regenerate(Some(e.to_string())).await;
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return self.regenerate(None).await;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Supply the cloud password after `TwoFactorRequired`. Rejection is terminal.
    pub async fn submit_password(&mut self, password: &str) -> AuthStatus {
        match &self.state {
            AuthState::TwoFactorRequired { .. } => {}
            AuthState::Disconnected => return AuthStatus::NotStarted,
            AuthState::Authenticated => return AuthStatus::Authenticated,
            AuthState::Failed { reason } => {
                return AuthStatus::Failed {
                    reason: reason.clone(),
                };
            }
            AuthState::AwaitingScan { token } => {
                return AuthStatus::AwaitingScan {
                    qr_url: token.url(),
                };
            }
        }
        match self.auth.check_password(password).await {
            Ok(()) => {
                info!("two-factor login completed");
                self.state = AuthState::Authenticated;
                AuthStatus::Authenticated
            }
            Err(e) => {
                warn!(error = %e, "two-factor password rejected");
                self.fail(e.to_string())
            }
        }
    }

    /// Count an expired (or failed) attempt and issue a new token, or fail past the cap.
    async fn regenerate(&mut self, cause: Option<String>) -> AuthStatus {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            let reason = match cause {
                Some(c) => format!("too many failed attempts ({}): {}", self.attempts, c),
                None => format!("QR code not scanned after {} attempts", self.attempts),
            };
            return self.fail(reason);
        }
        match self.auth.export_login_token().await {
            Ok(token) => {
                info!(attempt = self.attempts + 1, "QR token expired, issued a new one");
                let qr_url = token.url();
                self.state = AuthState::AwaitingScan { token };
                AuthStatus::Expired { qr_url }
            }
            Err(e) => self.fail(format!("could not regenerate QR token: {}", e)),
        }
    }

    fn fail(&mut self, reason: String) -> AuthStatus {
        warn!(reason = %reason, "login failed");
        self.state = AuthState::Failed {
            reason: reason.clone(),
        };
        AuthStatus::Failed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockAuthAdapter;

    #[tokio::test]
    async fn test_already_authorized_skips_qr() {
        let port = Arc::new(MockAuthAdapter::authorized());
        let mut session = AuthSession::new(port.clone());

        assert_eq!(session.start().await.unwrap(), AuthStatus::Authenticated);
        assert!(session.is_authenticated());
        assert_eq!(port.tokens_issued(), 0);
    }

    #[tokio::test]
    async fn test_poll_before_start() {
        let port = Arc::new(MockAuthAdapter::new());
        let mut session = AuthSession::new(port);
        assert_eq!(session.poll(Duration::ZERO).await, AuthStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_scan_accepted() {
        let port = Arc::new(
            MockAuthAdapter::new().with_polls([LoginPoll::Pending, LoginPoll::Accepted]),
        );
        let mut session = AuthSession::new(port.clone());

        let started = session.start().await.unwrap();
        assert!(started.qr_url().unwrap().starts_with("tg://login?token="));

        // First poll times out on Pending and regenerates; second sees Accepted.
        assert!(matches!(session.poll(Duration::ZERO).await, AuthStatus::Expired { .. }));
        assert_eq!(session.poll(Duration::ZERO).await, AuthStatus::Authenticated);
        assert_eq!(port.tokens_issued(), 2);
    }

    #[tokio::test]
    async fn test_expiry_regenerates_until_cap() {
        let port = Arc::new(MockAuthAdapter::new());
        let mut session = AuthSession::with_max_attempts(port.clone(), 5);
        session.start().await.unwrap();

        let mut urls = Vec::new();
        for _ in 0..4 {
            match session.poll(Duration::ZERO).await {
                AuthStatus::Expired { qr_url } => urls.push(qr_url),
                other => panic!("expected Expired, got {:?}", other),
            }
        }
        urls.dedup();
        assert_eq!(urls.len(), 4, "each expiry issues a new token");

        assert!(matches!(session.poll(Duration::ZERO).await, AuthStatus::Failed { .. }));
        assert_eq!(session.attempts(), 5);
        // 1 initial token + 4 regenerations; none after the cap.
        assert_eq!(port.tokens_issued(), 5);

        // Terminal: further polls neither regenerate nor count.
        assert!(matches!(session.poll(Duration::ZERO).await, AuthStatus::Failed { .. }));
        assert_eq!(port.tokens_issued(), 5);
        assert_eq!(session.attempts(), 5);
    }

    #[tokio::test]
    async fn test_two_factor_success() {
        let port = Arc::new(
            MockAuthAdapter::new()
                .with_polls([LoginPoll::PasswordRequired {
                    hint: Some("pet".into()),
                }])
                .with_password("hunter2"),
        );
        let mut session = AuthSession::new(port);
        session.start().await.unwrap();

        let status = session.poll(Duration::ZERO).await;
        assert_eq!(status.error(), Some(AuthError::TwoFactorRequired));
        assert_eq!(status.error().unwrap().detail(), "2fa_required");

        assert_eq!(session.submit_password("hunter2").await, AuthStatus::Authenticated);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_two_factor_rejection_is_terminal() {
        let port = Arc::new(
            MockAuthAdapter::new()
                .with_polls([LoginPoll::PasswordRequired { hint: None }])
                .with_password("right"),
        );
        let mut session = AuthSession::new(port);
        session.start().await.unwrap();
        session.poll(Duration::ZERO).await;

        assert!(matches!(session.submit_password("wrong").await, AuthStatus::Failed { .. }));
        assert!(matches!(session.state(), AuthState::Failed { .. }));
        assert!(matches!(session.submit_password("right").await, AuthStatus::Failed { .. }));
    }
}
