//! Credential verification and login orchestration.
//!
//! The credential store is an external collaborator reached through the
//! `CredentialStore` trait; the `Authenticator` owns the verify-then-issue
//! flow and the timeout budget around the adapter call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::principal::{AccountRef, Principal};
use super::token::{TokenCodec, TokenError};

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown user or wrong password — callers must not be able to tell
    /// which, so the store reports both identically.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// External credential store: verifies a username/password pair and
/// returns the principal identity with its authorized accounts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, CredentialError>;
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credential store unavailable: {0}")]
    Upstream(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Successful login result returned to the HTTP layer.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Signed bearer token embedding the authorized-account set.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Display list for the login response body.
    pub accounts: Vec<AccountRef>,
}

/// Orchestrates credential verification and token issuance.
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    adapter_timeout: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec, adapter_timeout: Duration) -> Self {
        Self { store, codec, adapter_timeout }
    }

    /// Verify the pair against the credential store and issue a token.
    ///
    /// A principal with zero authorized accounts still logs in; the token
    /// simply authorizes nothing and every device query will be denied.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let verify = self.store.verify_credentials(username, password);
        let result = tokio::time::timeout(self.adapter_timeout, verify)
            .await
            .map_err(|_| {
                tracing::warn!(user = %username, "auth.login credential store timed out");
                AuthError::Upstream("credential store timed out".into())
            })?;

        let principal = match result {
            Ok(p) => p,
            Err(CredentialError::InvalidCredentials) => {
                tracing::info!(user = %username, "auth.login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(CredentialError::Unavailable(msg)) => {
                tracing::error!(user = %username, error = %msg, "auth.login upstream failure");
                return Err(AuthError::Upstream(msg));
            }
        };

        let issued = self.codec.issue(&principal)?;
        tracing::info!(
            user = %principal.subject,
            accounts = principal.accounts.len(),
            expires = %issued.expires_at,
            "auth.login ok"
        );
        Ok(LoginOutcome {
            token: issued.token,
            expires_at: issued.expires_at,
            accounts: principal.accounts,
        })
    }

    /// Decode and verify a bearer token presented on a request.
    pub fn verify_token(&self, token: &str) -> Result<super::token::VerifiedClaims, TokenError> {
        self.codec.decode(token)
    }
}
