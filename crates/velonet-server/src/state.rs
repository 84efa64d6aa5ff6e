//! Shared application state handed to every request handler.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use velonet_store::Database;

use crate::config::ServerConfig;
use crate::notify::Notifier;
use crate::rate_limit::RateLimiter;
use crate::realtime::Hub;

/// The database handle shared across handlers and background tasks.  SQLite
/// connections are not `Sync`, so access is serialized behind a tokio mutex;
/// every store call is short and synchronous.
pub type Db = Arc<Mutex<Database>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub hub: Hub,
    pub notifier: Notifier,
    pub config: Arc<ServerConfig>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}
