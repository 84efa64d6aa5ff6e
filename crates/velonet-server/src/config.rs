//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use velonet_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_PRESENCE_TIMEOUT_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: none (platform data directory).
    pub database_path: Option<PathBuf>,

    /// URL-safe base64 VAPID private key used to authenticate Web Push
    /// requests.  Push delivery is disabled when unset.
    /// Env: `VAPID_PRIVATE_KEY`
    /// Default: none.
    pub vapid_private_key: Option<String>,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// How long a realtime connection may go without a heartbeat before the
    /// presence sweeper marks it dead.
    /// Env: `PRESENCE_TIMEOUT_SECS`
    /// Default: 90.
    pub presence_timeout: Duration,

    /// Sustained per-IP request rate.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: 10.
    pub rate_limit_per_sec: f64,

    /// Per-IP burst capacity.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: 30.
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            vapid_private_key: None,
            admin_token: None,
            presence_timeout: Duration::from_secs(DEFAULT_PRESENCE_TIMEOUT_SECS),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(key) = std::env::var("VAPID_PRIVATE_KEY") {
            if !key.is_empty() {
                config.vapid_private_key = Some(key);
            }
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Ok(val) = std::env::var("PRESENCE_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.presence_timeout = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid PRESENCE_TIMEOUT_SECS, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(rate) if rate > 0.0 => config.rate_limit_per_sec = rate,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(burst) if burst >= 1.0 => config.rate_limit_burst = burst,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
