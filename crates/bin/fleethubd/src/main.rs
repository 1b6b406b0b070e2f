//! # fleethubd — fleethub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env var overrides)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve, with graceful shutdown on SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use fleethub_adapter_http_axum::state::AppState;
use fleethub_adapter_storage_sqlite_sqlx::device_repo::SqliteDeviceRepository;
use fleethub_adapter_storage_sqlite_sqlx::history_repo::SqliteHistoryRepository;
use fleethub_app::event_bus::InProcessEventBus;
use fleethub_app::services::device_service::DeviceService;
use fleethub_app::services::history_service::HistoryService;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = fleethub_adapter_storage_sqlite_sqlx::pool::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories — the device repo is shared with the history service
    // for existence checks on append.
    let device_repo = Arc::new(SqliteDeviceRepository::new(pool.clone()));
    let history_repo = SqliteHistoryRepository::new(pool);

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));

    // Services + HTTP
    let state = AppState::new(
        DeviceService::new(Arc::clone(&device_repo), Arc::clone(&event_bus)),
        HistoryService::new(history_repo, device_repo, Arc::clone(&event_bus)),
        event_bus,
    );
    let app = fleethub_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "fleethubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
