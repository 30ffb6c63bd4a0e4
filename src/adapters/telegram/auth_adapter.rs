//! Implements AuthPort using grammers Client and raw QR-login requests.
//!
//! Holds a client (clone shared with TgGateway in main). Polling re-exports the login
//! token: the server answers with the same token until it is scanned, then with success.

use crate::domain::{DomainError, LoginPoll, QrToken};
use crate::ports::AuthPort;
use async_trait::async_trait;
use grammers_client::tl;
use grammers_client::Client;
use grammers_client::InvocationError;
use tracing::debug;

/// Auth adapter. Wraps grammers Client for QR login and 2FA.
pub struct GrammersAuthAdapter {
    client: Client,
    api_id: i32,
    api_hash: String,
}

impl GrammersAuthAdapter {
    pub fn new(client: Client, api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            client,
            api_id,
            api_hash: api_hash.into(),
        }
    }

    async fn export_token(&self) -> Result<tl::enums::auth::LoginToken, InvocationError> {
        self.client
            .invoke(&tl::functions::auth::ExportLoginToken {
                api_id: self.api_id,
                api_hash: self.api_hash.clone(),
                except_ids: vec![],
            })
            .await
    }

    async fn password_hint(&self) -> Option<String> {
        match self
            .client
            .invoke(&tl::functions::account::GetPassword {})
            .await
        {
            Ok(tl::enums::account::Password::Password(p)) => p.hint,
            Err(e) => {
                debug!(error = %e, "could not fetch password hint");
                None
            }
        }
    }
}

fn is_password_needed(e: &InvocationError) -> bool {
    matches!(e, InvocationError::Rpc(rpc) if rpc.name == "SESSION_PASSWORD_NEEDED")
}

fn migrate_error(dc_id: i32) -> DomainError {
    DomainError::Auth(format!(
        "login token must be imported on DC {}; log in from an account on the home DC",
        dc_id
    ))
}

#[async_trait]
impl AuthPort for GrammersAuthAdapter {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| DomainError::Auth(e.to_string()))
    }

    async fn export_login_token(&self) -> Result<QrToken, DomainError> {
        use tl::enums::auth::LoginToken;

        match self.export_token().await {
            Ok(LoginToken::Token(t)) => Ok(QrToken {
                token: t.token,
                expires_at: Some(super::mapper::timestamp(t.expires)),
            }),
            Ok(LoginToken::Success(_)) => {
                Err(DomainError::Auth("session was authorized while issuing a token".into()))
            }
            Ok(LoginToken::MigrateTo(m)) => Err(migrate_error(m.dc_id)),
            Err(e) => Err(DomainError::Auth(format!("export login token: {}", e))),
        }
    }

    async fn poll_login_token(&self) -> Result<LoginPoll, DomainError> {
        use tl::enums::auth::LoginToken;

        match self.export_token().await {
            Ok(LoginToken::Token(_)) => Ok(LoginPoll::Pending),
            Ok(LoginToken::Success(_)) => Ok(LoginPoll::Accepted),
            Ok(LoginToken::MigrateTo(m)) => Err(migrate_error(m.dc_id)),
            Err(e) if is_password_needed(&e) => Ok(LoginPoll::PasswordRequired {
                hint: self.password_hint().await,
            }),
            Err(e) => Err(DomainError::Auth(format!("poll login token: {}", e))),
        }
    }

    async fn check_password(&self, password: &str) -> Result<(), DomainError> {
        let token = self
            .client
            .get_password_information()
            .await
            .map_err(|e| DomainError::Auth(format!("get password information: {}", e)))?;
        self.client
            .check_password(token, password.as_bytes())
            .await
            .map_err(|e| DomainError::Auth(format!("check_password: {}", e)))?;
        Ok(())
    }
}
