use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use common::domain::{DomainError, LocationPoint, LocationRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// One stored point as served by `GET /tracks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPointResponse {
    pub id: i64,
    pub user: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: i32,
    pub velocity: i32,
    pub timestamp: i64,
    pub pid: u16,
    pub created_at: DateTime<Utc>,
}

impl From<LocationPoint> for LocationPointResponse {
    fn from(point: LocationPoint) -> Self {
        Self {
            id: point.id,
            user: point.user,
            latitude: point.latitude,
            longitude: point.longitude,
            battery: point.battery,
            velocity: point.velocity,
            timestamp: point.timestamp,
            pid: point.packet_id,
            created_at: point.created_at,
        }
    }
}

/// Store failure surfaced to HTTP clients without internal detail
#[derive(Debug)]
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

pub async fn index() -> &'static str {
    "Hello, World!"
}

#[instrument(name = "list_tracks", skip_all)]
pub async fn list_tracks(
    State(location_repository): State<Arc<dyn LocationRepository>>,
) -> Result<Json<Vec<LocationPointResponse>>, ApiError> {
    let points = location_repository.list_locations().await?;
    debug!(count = points.len(), "listed tracks");

    Ok(Json(
        points.into_iter().map(LocationPointResponse::from).collect(),
    ))
}
