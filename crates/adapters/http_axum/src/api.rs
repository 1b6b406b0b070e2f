//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod history;

use axum::Router;
use axum::routing::{get, patch};

use fleethub_app::ports::{DeviceRepository, HistoryRepository};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<DR, HR>() -> Router<AppState<DR, HR>>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    Router::new()
        // Devices
        .route(
            "/devices",
            get(devices::list::<DR, HR>).post(devices::create::<DR, HR>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<DR, HR>)
                .put(devices::update::<DR, HR>)
                .delete(devices::delete::<DR, HR>),
        )
        .route(
            "/devices/{id}/status",
            patch(devices::update_status::<DR, HR>),
        )
        .route("/devices/{id}/data", patch(devices::update_data::<DR, HR>))
        // History
        .route(
            "/devices/{id}/history",
            get(history::list::<DR, HR>).post(history::create::<DR, HR>),
        )
        .route(
            "/devices/{id}/history/latest",
            get(history::latest::<DR, HR>),
        )
}
