//! HTTP surface for the job registry.
//!
//! ```text
//! POST /api/enumerate              {"domain": "example.com"} -> {"scan_id", "status"}
//! GET  /api/scan/{id}              poll payload
//! GET  /api/export/{id}/{format}   txt or json attachment
//! POST /api/scan/{id}/cancel       poll payload after cancellation
//! ```

use crate::core::{EngineError, JobId};
use crate::export::{self, ExportFormat};
use crate::manager::JobRegistry;
use crate::poll::{self, PollResponse};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Result type for handlers.
pub type AppResult<T> = Result<T, AppError>;

/// An error answered as `{"error": message}` with a status code.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status.
    pub status: StatusCode,
    /// Message sent to the client.
    pub message: String,
}

impl AppError {
    /// Creates an error with `status`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// A 500 error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::InvalidInput { .. } | EngineError::NotReady { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::CapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => {
                tracing::error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Body of `POST /api/enumerate`.
#[derive(Debug, Deserialize)]
pub struct EnumerateRequest {
    /// Domain to scan.
    #[serde(default)]
    pub domain: String,
}

/// Answer to `POST /api/enumerate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnumerateResponse {
    /// Identifier to poll with.
    pub scan_id: JobId,
    /// Always `"processing"`.
    pub status: String,
}

/// Builds the router over `registry`.
pub fn router(registry: JobRegistry) -> Router {
    Router::new()
        .route("/api/enumerate", post(enumerate))
        .route("/api/scan/{id}", get(scan_status))
        .route("/api/scan/{id}/cancel", post(cancel_scan))
        .route("/api/export/{id}/{format}", get(export_results))
        .with_state(registry)
}

async fn enumerate(
    State(registry): State<JobRegistry>,
    payload: Result<Json<EnumerateRequest>, JsonRejection>,
) -> AppResult<Json<EnumerateResponse>> {
    let Json(request) = payload?;
    let scan_id = registry.create(&request.domain)?;
    Ok(Json(EnumerateResponse {
        scan_id,
        status: "processing".to_string(),
    }))
}

async fn scan_status(
    State(registry): State<JobRegistry>,
    Path(id): Path<String>,
) -> AppResult<Json<PollResponse>> {
    let id: JobId = id.parse()?;
    Ok(Json(poll::poll(&registry, id)?))
}

async fn cancel_scan(
    State(registry): State<JobRegistry>,
    Path(id): Path<String>,
) -> AppResult<Json<PollResponse>> {
    let id: JobId = id.parse()?;
    let snapshot = registry.cancel(id).await?;
    Ok(Json(PollResponse::from(snapshot)))
}

async fn export_results(
    State(registry): State<JobRegistry>,
    Path((id, format)): Path<(String, String)>,
) -> AppResult<Response> {
    let id: JobId = id.parse()?;
    let format: ExportFormat = format.parse()?;
    let artifact = export::export(&registry, id, format)?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.body,
    )
        .into_response())
}
