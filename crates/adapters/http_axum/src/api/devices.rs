//! JSON REST handlers for the device registry.
//!
//! Request bodies arrive as raw JSON and go through the command validator
//! before they reach the services, so error responses enumerate every
//! violated constraint at once.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fleethub_app::ports::{DeviceRepository, HistoryRepository};
use fleethub_domain::command::{self, Command, CommandKind};
use fleethub_domain::device::Device;
use fleethub_domain::error::{FleetError, ValidationError};
use fleethub_domain::id::DeviceId;

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn parse_device_id(raw: &str) -> Result<DeviceId, ApiError> {
    DeviceId::from_str(raw).map_err(|_| {
        ApiError::from(FleetError::Validation(ValidationError::single(
            "device id must be a valid UUID",
        )))
    })
}

/// Body returned by the delete endpoint.
#[derive(Serialize)]
pub struct DeleteBody {
    pub message: String,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Device>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get/update endpoints.
pub enum DeviceResponse {
    Ok(Json<Device>),
}

impl IntoResponse for DeviceResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Device>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    Deleted(Json<DeleteBody>),
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Deleted(json) => json.into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list<DR, HR>(
    State(state): State<AppState<DR, HR>>,
) -> Result<ListResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let devices = state.device_service.list_devices().await?;
    Ok(ListResponse::Ok(Json(devices)))
}

/// `GET /api/devices/{id}`
pub async fn get<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let device = state.device_service.get_device(device_id).await?;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `POST /api/devices`
pub async fn create<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let Command::Create(create) = command::validate(CommandKind::Create, &payload)
        .map_err(FleetError::from)?
    else {
        return Err(unexpected_command());
    };
    let created = state.device_service.create_device(create).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/devices/{id}`
pub async fn update<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let Command::Update(update) = command::validate(CommandKind::Update, &payload)
        .map_err(FleetError::from)?
    else {
        return Err(unexpected_command());
    };
    let updated = state.device_service.update_device(device_id, update).await?;
    Ok(DeviceResponse::Ok(Json(updated)))
}

/// `PATCH /api/devices/{id}/status`
pub async fn update_status<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let Command::UpdateStatus(status) = command::validate(CommandKind::UpdateStatus, &payload)
        .map_err(FleetError::from)?
    else {
        return Err(unexpected_command());
    };
    let updated = state.device_service.update_status(device_id, status).await?;
    Ok(DeviceResponse::Ok(Json(updated)))
}

/// `PATCH /api/devices/{id}/data`
pub async fn update_data<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let Command::UpdateData(data) = command::validate(CommandKind::UpdateData, &payload)
        .map_err(FleetError::from)?
    else {
        return Err(unexpected_command());
    };
    let updated = state.device_service.update_data(device_id, data).await?;
    Ok(DeviceResponse::Ok(Json(updated)))
}

/// `DELETE /api/devices/{id}`
pub async fn delete<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    state.device_service.delete_device(device_id).await?;
    Ok(DeleteResponse::Deleted(Json(DeleteBody {
        message: format!("device {device_id} deleted"),
    })))
}

// The validator returns the variant matching the requested kind; any other
// variant here is a programming error, surfaced as a 500.
fn unexpected_command() -> ApiError {
    ApiError::from(FleetError::Storage("unexpected command variant".into()))
}
