//! Runtime configuration, resolved once at startup from environment
//! variables and passed down by value. The signing secret is injected into
//! the token codec rather than exposed as a process global so the codec
//! stays unit-testable with an arbitrary key.

use base64::Engine;

/// Configuration for the fleetgate server.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (default: 7878).
    pub http_port: u16,
    /// Data root holding users.json / devices.json (default: "data").
    pub data_root: String,
    /// Raw bytes of the HS256 token signing secret.
    pub signing_secret: Vec<u8>,
    /// Access token lifetime in seconds (default: 3600).
    pub token_ttl_secs: u64,
    /// Clock-skew leeway applied to expiry checks, in seconds (default: 5).
    /// Without leeway, tokens expiring mid-flight fail closed as expired.
    pub clock_leeway_secs: u64,
    /// Budget for a single credential-store or device-repository call, in
    /// milliseconds (default: 5000). A slow adapter must not stall the pool.
    pub adapter_timeout_ms: u64,
    /// `iss` claim stamped into and required of every token.
    pub token_issuer: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 7878,
            data_root: "data".into(),
            signing_secret: Vec::new(),
            token_ttl_secs: 3600,
            clock_leeway_secs: 5,
            adapter_timeout_ms: 5000,
            token_issuer: "fleetgate".into(),
        }
    }
}

impl Config {
    /// Build a config from `FLEETGATE_*` environment variables, falling back
    /// to the documented defaults. When no signing secret is configured a
    /// random one is generated; tokens then die with the process, which is
    /// only acceptable for development.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Some(p) = read_env_parse::<u16>("FLEETGATE_HTTP_PORT") { cfg.http_port = p; }
        if let Ok(root) = std::env::var("FLEETGATE_DATA_FOLDER") {
            if !root.trim().is_empty() { cfg.data_root = root; }
        }
        if let Some(t) = read_env_parse::<u64>("FLEETGATE_TOKEN_TTL_SECS") { cfg.token_ttl_secs = t; }
        if let Some(l) = read_env_parse::<u64>("FLEETGATE_CLOCK_LEEWAY_SECS") { cfg.clock_leeway_secs = l; }
        if let Some(ms) = read_env_parse::<u64>("FLEETGATE_ADAPTER_TIMEOUT_MS") { cfg.adapter_timeout_ms = ms; }
        if let Ok(iss) = std::env::var("FLEETGATE_TOKEN_ISSUER") {
            if !iss.trim().is_empty() { cfg.token_issuer = iss; }
        }
        cfg.signing_secret = match std::env::var("FLEETGATE_SIGNING_SECRET") {
            Ok(s) if !s.trim().is_empty() => s.into_bytes(),
            _ => {
                let secret = generate_secret();
                tracing::warn!(
                    "FLEETGATE_SIGNING_SECRET not set; generated an ephemeral secret. \
                     Issued tokens will not survive a restart."
                );
                secret
            }
        };
        cfg
    }
}

fn read_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// 256-bit random secret, base64url-encoded so it is printable if exported.
fn generate_secret() -> Vec<u8> {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf).into_bytes()
}
