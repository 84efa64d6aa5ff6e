/// Application name
pub const APP_NAME: &str = "Velonet";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Time-to-live declared to the push service for every Web Push message (24h)
pub const PUSH_TTL_SECS: u32 = 86_400;

/// Seconds without a heartbeat before a realtime connection is considered dead.
/// The client emits heartbeats roughly every 30s; the server-side eviction
/// window is configurable (env `PRESENCE_TIMEOUT_SECS`), this is the default.
pub const DEFAULT_PRESENCE_TIMEOUT_SECS: u64 = 90;

/// How often the presence sweeper scans for dead connections
pub const PRESENCE_SWEEP_INTERVAL_SECS: u64 = 30;

/// Maximum request body size accepted by the HTTP API (1 MiB)
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default page size for listing endpoints
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Upper bound a client may request as a page size
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Half-life of an interaction signal, in days
pub const SCORE_HALF_LIFE_DAYS: f64 = 7.0;

/// Interaction-score weights.  They sum to 100 so a user who did everything
/// just now scores 100.
pub const SCORE_WEIGHT_LOGIN: f64 = 10.0;
pub const SCORE_WEIGHT_MESSAGE: f64 = 30.0;
pub const SCORE_WEIGHT_POST: f64 = 35.0;
pub const SCORE_WEIGHT_FRIEND_ACCEPT: f64 = 25.0;
