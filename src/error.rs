//! Unified boundary error model and HTTP mapping helpers.
//! Internal subsystems carry richer typed errors (see `identity` and
//! `devices`); everything is collapsed into this enum before it crosses the
//! HTTP surface so that security-relevant distinctions never leak to clients.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiError {
    BadRequest { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl ApiError {
    pub fn code_str(&self) -> &str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::Forbidden { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Upstream { code, .. }
            | ApiError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest { message, .. }
            | ApiError::Unauthorized { message, .. }
            | ApiError::Forbidden { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Upstream { message, .. }
            | ApiError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn bad_request<S: Into<String>>(code: S, msg: S) -> Self { ApiError::BadRequest { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { ApiError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { ApiError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { ApiError::NotFound { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { ApiError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { ApiError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::BadRequest { .. } => 400,
            ApiError::Unauthorized { .. } => 401,
            ApiError::Forbidden { .. } => 403,
            ApiError::NotFound { .. } => 404,
            ApiError::Upstream { .. } => 500,
            ApiError::Internal { .. } => 500,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(ApiError::bad_request("missing_account_id", "accountId is required").http_status(), 400);
        assert_eq!(ApiError::unauthorized("invalid_token", "unauthorized").http_status(), 401);
        assert_eq!(ApiError::forbidden("access_denied", "forbidden").http_status(), 403);
        assert_eq!(ApiError::not_found("device_not_found", "device not found").http_status(), 404);
        assert_eq!(ApiError::upstream("repository_error", "upstream failure").http_status(), 500);
        assert_eq!(ApiError::internal("internal_error", "panic").http_status(), 500);
    }

    #[test]
    fn display_carries_code_and_message() {
        let e = ApiError::forbidden("access_denied", "forbidden");
        assert_eq!(e.to_string(), "access_denied: forbidden");
        assert_eq!(e.code_str(), "access_denied");
        assert_eq!(e.message(), "forbidden");
    }
}
