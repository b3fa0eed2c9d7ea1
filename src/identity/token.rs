//! Access token codec: issuance and verification of signed HS256 tokens
//! carrying the subject and its authorized-account set.
//!
//! Decode failures are kept distinguishable (`Malformed` vs
//! `InvalidSignature` vs `Expired`) for diagnostics even though the HTTP
//! surface collapses all three to 401.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use super::principal::{AccountId, Principal};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Structurally invalid: not a token at all, bad segments, bad JSON.
    #[error("malformed token")]
    Malformed,

    /// Signature did not verify — tampered or signed with another key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Signature verified but the token is past its expiry (with leeway).
    #[error("token has expired")]
    Expired,

    /// Issuance-side failure while serializing or signing.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the authenticated username.
    pub sub: String,
    /// Authorized account ids, fixed at issuance. Sorted and deduplicated.
    pub accounts: Vec<AccountId>,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expiration (Unix timestamp, seconds).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Verified claims — a newtype proving the token's signature and expiry
/// were checked. The access enforcer only accepts this type.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub Claims);

/// A freshly issued token together with its expiry instant.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token codec holding the signing keys. Built once at startup from the
/// injected signing secret and cloned into request state; read-only after
/// construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl_secs: u64,
    leeway_secs: u64,
}

impl TokenCodec {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&config.signing_secret),
            decoding_key: DecodingKey::from_secret(&config.signing_secret),
            issuer: config.token_issuer.clone(),
            ttl_secs: config.token_ttl_secs,
            leeway_secs: config.clock_leeway_secs,
        }
    }

    /// Issue a signed token for the principal. Expiry = now + ttl.
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let exp = now + self.ttl_secs as i64;
        let claims = Claims {
            sub: principal.subject.clone(),
            accounts: principal.account_ids(),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| TokenError::Encoding("expiry out of range".into()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature first, then expiry (with the configured leeway),
    /// and return the claims. Fails closed: a token expiring mid-flight is
    /// `Expired` once past the leeway.
    pub fn decode(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| VerifiedClaims(data.claims))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
                _ => TokenError::Malformed,
            })
    }
}
