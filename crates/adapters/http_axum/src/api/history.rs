//! JSON REST handlers for device history.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use fleethub_app::ports::{DeviceRepository, HistoryRepository};
use fleethub_domain::command::{self, Command, CommandKind};
use fleethub_domain::error::{FleetError, ValidationError};
use fleethub_domain::history::HistoryEntry;
use fleethub_domain::time::{Timestamp, from_millis};

use crate::api::devices::parse_device_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for the history window endpoint.
///
/// Bounds are epoch milliseconds, matching the wire format of timestamps
/// everywhere else.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<usize>,
}

fn parse_bound(field: &'static str, millis: i64) -> Result<Timestamp, ApiError> {
    from_millis(millis).ok_or_else(|| {
        ApiError::from(FleetError::Validation(ValidationError::single(format!(
            "{field} is out of range"
        ))))
    })
}

/// Possible responses from the history window endpoint.
pub enum ListResponse {
    Ok(Json<Vec<HistoryEntry>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the append endpoint.
pub enum CreateResponse {
    Created(Json<HistoryEntry>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the latest endpoint.
pub enum LatestResponse {
    Ok(Json<HistoryEntry>),
}

impl IntoResponse for LatestResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/devices/{id}/history?startTime=&endTime=&limit=`
pub async fn list<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<ListResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let from = params
        .start_time
        .map(|millis| parse_bound("startTime", millis))
        .transpose()?;
    let to = params
        .end_time
        .map(|millis| parse_bound("endTime", millis))
        .transpose()?;

    let entries = state
        .history_service
        .query(device_id, from, to, params.limit)
        .await?;
    Ok(ListResponse::Ok(Json(entries)))
}

/// `POST /api/devices/{id}/history`
pub async fn create<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let Command::HistoryAppend(reading) =
        command::validate(CommandKind::HistoryAppend, &payload).map_err(FleetError::from)?
    else {
        return Err(FleetError::Storage("unexpected command variant".into()).into());
    };
    let entry = state.history_service.append(device_id, reading).await?;
    Ok(CreateResponse::Created(Json(entry)))
}

/// `GET /api/devices/{id}/history/latest`
pub async fn latest<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
) -> Result<LatestResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let entry = state.history_service.latest(device_id).await?;
    Ok(LatestResponse::Ok(Json(entry)))
}
