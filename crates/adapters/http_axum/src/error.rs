//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fleethub_domain::error::FleetError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<String>>,
}

/// Maps [`FleetError`] to an HTTP response with appropriate status code.
pub struct ApiError(FleetError);

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            FleetError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation failed".to_string(),
                    violations: Some(err.violations),
                },
            ),
            FleetError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: err.to_string(),
                    violations: None,
                },
            ),
            FleetError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal server error".to_string(),
                        violations: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
