//! Axum router assembly.

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use fleethub_app::ports::{DeviceRepository, HistoryRepository};
use fleethub_domain::time::now;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the REST API under `/api` and the realtime hub at `/ws`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<DR, HR>(state: AppState<DR, HR>) -> Router
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .route("/ws", get(crate::ws::upgrade::<DR, HR>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: i64,
}

async fn health_check() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        timestamp: now().timestamp_millis(),
    })
}
