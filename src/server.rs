//!
//! fleetgate HTTP server
//! ---------------------
//! Axum-based HTTP API for the device-monitoring backend.
//!
//! Responsibilities:
//! - Login endpoint issuing account-scoped bearer tokens.
//! - Bearer-token authentication on every device route. Tokens are read
//!   from the `Authorization` header only, never from the query string,
//!   so they cannot leak through request logs or browser history.
//! - Account-scope enforcement before any repository access.
//! - Uniform `{success, data|message}` response envelopes and the status
//!   mapping 400/401/403/404/500.
//! - First-run bootstrap of the default operator and demo fleet.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::FutureExt; // for catch_unwind on async blocks
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::devices::{DeviceError, DeviceQueryService};
use crate::error::ApiError;
use crate::identity::{authorize, AuthError, Authenticator, TokenError, VerifiedClaims};
use crate::storage::{ensure_default_operator, seed_demo_fleet, FileCredentialStore, FileDeviceRepository};

/// Shared server state injected into all handlers. Everything inside is
/// read-only after startup; requests share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub devices: Arc<DeviceQueryService>,
}

/// Wire the authenticator and device query service over the file-backed
/// adapters under the configured data root.
pub fn build_state(config: &Config) -> AppState {
    let codec = crate::identity::TokenCodec::new(config);
    let adapter_timeout = Duration::from_millis(config.adapter_timeout_ms);
    let credentials = Arc::new(FileCredentialStore::new(&config.data_root));
    let repository = Arc::new(FileDeviceRepository::new(&config.data_root));
    AppState {
        auth: Arc::new(Authenticator::new(credentials, codec, adapter_timeout)),
        devices: Arc::new(DeviceQueryService::new(repository, adapter_timeout)),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "fleetgate ok" }))
        .route("/v1/auth/login", post(login))
        .route("/v1/devices", get(list_devices))
        .route("/v1/devices/{device_id}", get(get_device))
        .with_state(state)
}

/// Start the fleetgate HTTP server with configuration from the
/// environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "fleetgate starting: http_port={}, data_root={}, token_ttl_secs={}, clock_leeway_secs={}, adapter_timeout_ms={}",
        config.http_port, config.data_root, config.token_ttl_secs, config.clock_leeway_secs, config.adapter_timeout_ms
    );

    std::fs::create_dir_all(&config.data_root)
        .with_context(|| format!("Failed to create or access data root: {}", config.data_root))?;
    ensure_default_operator(FsPath::new(&config.data_root))
        .with_context(|| format!("While ensuring default operator under {}", config.data_root))?;
    seed_demo_fleet(FsPath::new(&config.data_root))
        .with_context(|| format!("While seeding demo fleet under {}", config.data_root))?;

    let app = router(build_state(&config));
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Envelope and mapping helpers
// ---------------------------------------------------------------------------

fn ok_response(data: serde_json::Value) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({"success": true, "data": data})))
}

fn error_response(err: &ApiError) -> (StatusCode, Json<serde_json::Value>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"success": false, "message": err.message()})))
}

/// Extract the bearer token from the Authorization header. This is the
/// only accepted transport for tokens.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let rest = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Verify the request's bearer token. The response message is a uniform
/// "unauthorized" for every failure mode; the distinction survives in the
/// error code and the logs only.
fn authenticate_request(state: &AppState, headers: &HeaderMap) -> Result<VerifiedClaims, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Err(ApiError::unauthorized("missing_token", "unauthorized"));
    };
    state.auth.verify_token(token).map_err(|e| {
        tracing::info!(reason = %e, "auth.token rejected");
        let code = match e {
            TokenError::Expired => "token_expired",
            TokenError::InvalidSignature => "token_invalid_signature",
            TokenError::Malformed => "token_malformed",
            TokenError::Encoding(_) => "token_error",
        };
        ApiError::unauthorized(code, "unauthorized")
    })
}

fn auth_error_to_api(err: &AuthError) -> ApiError {
    match err {
        // Uniform message: unknown user and wrong password are not
        // distinguishable from outside.
        AuthError::InvalidCredentials => {
            ApiError::unauthorized("invalid_credentials", "invalid credentials")
        }
        AuthError::Upstream(_) => {
            ApiError::upstream("upstream_unavailable", "authentication service unavailable")
        }
        AuthError::Token(_) => ApiError::internal("token_issue_failed", "internal server error"),
    }
}

fn device_error_to_api(err: &DeviceError) -> ApiError {
    match err {
        DeviceError::NotFound => ApiError::not_found("device_not_found", "device not found"),
        DeviceError::Repository(msg) => {
            error!(error = %msg, "devices repository failure");
            ApiError::upstream("repository_error", "device repository unavailable")
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Ok(payload) = serde_json::from_value::<LoginPayload>(payload) else {
        return error_response(&ApiError::bad_request(
            "missing_credentials",
            "username and password are required",
        ));
    };
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return error_response(&ApiError::bad_request(
            "missing_credentials",
            "username and password are required",
        ));
    }

    match state.auth.login(&payload.username, &payload.password).await {
        Ok(outcome) => ok_response(json!({
            "token": outcome.token,
            "expires": outcome.expires_at.to_rfc3339(),
            "accounts": outcome.accounts,
        })),
        Err(e) => error_response(&auth_error_to_api(&e)),
    }
}

#[derive(Debug, Deserialize)]
struct AccountQuery {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
}

impl AccountQuery {
    fn require(&self) -> Result<&str, ApiError> {
        match self.account_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ApiError::bad_request(
                "missing_account_id",
                "accountId query parameter is required",
            )),
        }
    }
}

async fn list_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccountQuery>,
) -> impl IntoResponse {
    let claims = match authenticate_request(&state, &headers) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let account_id = match query.require() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    // Scope check strictly precedes any repository access, so a denial
    // looks the same whether or not the account exists.
    let grant = match authorize(&claims, account_id) {
        Ok(g) => g,
        Err(_) => {
            tracing::info!(subject = %claims.0.sub, account = %account_id, "devices.list denied");
            return error_response(&ApiError::forbidden("access_denied", "forbidden"));
        }
    };

    let fut = async { state.devices.list_devices(&grant).await };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(devices)) => ok_response(json!(devices)),
        Ok(Err(e)) => error_response(&device_error_to_api(&e)),
        Err(panic_payload) => error_response(&panic_to_api("list_devices", panic_payload)),
    }
}

async fn get_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<String>,
    Query(query): Query<AccountQuery>,
) -> impl IntoResponse {
    let claims = match authenticate_request(&state, &headers) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let account_id = match query.require() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let grant = match authorize(&claims, account_id) {
        Ok(g) => g,
        Err(_) => {
            tracing::info!(subject = %claims.0.sub, account = %account_id, "devices.get denied");
            return error_response(&ApiError::forbidden("access_denied", "forbidden"));
        }
    };

    let fut = async { state.devices.get_device(&grant, &device_id).await };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(device)) => ok_response(json!(device)),
        Ok(Err(e)) => error_response(&device_error_to_api(&e)),
        Err(panic_payload) => error_response(&panic_to_api("get_device", panic_payload)),
    }
}

/// Convert a handler panic into a clean 500 without crashing the server
/// task.
fn panic_to_api(handler: &str, payload: Box<dyn std::any::Any + Send>) -> ApiError {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic"
    };
    error!(target: "panic", "HTTP {} panic: {}", handler, msg);
    ApiError::internal("internal_panic", "internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn bearer_token_accepts_header_only_forms() {
        assert_eq!(bearer_token(&headers_with_auth("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with_auth("bearer abc")), Some("abc"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_empties() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers_with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with_auth("abc")), None);
    }

    #[test]
    fn account_query_requires_non_empty_id() {
        assert!(AccountQuery { account_id: None }.require().is_err());
        assert!(AccountQuery { account_id: Some("  ".into()) }.require().is_err());
        assert_eq!(AccountQuery { account_id: Some("acc-a".into()) }.require().unwrap(), "acc-a");
    }

    #[test]
    fn status_mapping_matches_contract() {
        let (status, _) = error_response(&ApiError::bad_request("missing_account_id", "x"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = error_response(&ApiError::unauthorized("token_expired", "x"));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = error_response(&ApiError::forbidden("access_denied", "x"));
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = error_response(&ApiError::not_found("device_not_found", "x"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = error_response(&ApiError::upstream("repository_error", "x"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn deny_and_not_found_messages_do_not_echo_ids() {
        let deny = ApiError::forbidden("access_denied", "forbidden");
        let missing = ApiError::not_found("device_not_found", "device not found");
        assert!(!deny.message().contains("acc"));
        assert!(!missing.message().contains("dev-"));
    }
}
