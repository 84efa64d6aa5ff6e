//! Velonet backend server binary.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use velonet_shared::constants::{APP_NAME, PRESENCE_SWEEP_INTERVAL_SECS};
use velonet_shared::PresenceStatus;
use velonet_store::Database;

use velonet_server::api;
use velonet_server::config::ServerConfig;
use velonet_server::notify::Notifier;
use velonet_server::push::{PushGateway, WebPushGateway};
use velonet_server::rate_limit::RateLimiter;
use velonet_server::realtime::Hub;
use velonet_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,velonet_server=debug")),
        )
        .init();

    info!("Starting {APP_NAME} server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::open_default()?,
    };
    let db = Arc::new(Mutex::new(database));

    let hub = Hub::new();

    let gateway: Option<Arc<dyn PushGateway>> = match &config.vapid_private_key {
        Some(key) => Some(Arc::new(WebPushGateway::new(key.clone()))),
        None => {
            info!("VAPID_PRIVATE_KEY not set; Web Push delivery disabled");
            None
        }
    };

    let notifier = Notifier::spawn(db.clone(), hub.clone(), gateway);

    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let app_state = AppState {
        db: db.clone(),
        hub: hub.clone(),
        notifier,
        config: Arc::new(config.clone()),
        rate_limiter: rate_limiter.clone(),
        started_at: Instant::now(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // Presence sweeper: evict realtime connections that stopped heartbeating
    // and tell their friends they went offline.
    let sweep_db = db.clone();
    let sweep_hub = hub.clone();
    let presence_timeout = config.presence_timeout;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(PRESENCE_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            for user in sweep_hub.sweep_idle(presence_timeout).await {
                api::ws::broadcast_presence(
                    &sweep_db,
                    &sweep_hub,
                    user,
                    PresenceStatus::Offline,
                )
                .await;
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
