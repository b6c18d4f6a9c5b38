//! Renderer session endpoints.
//!
//! - POST /api/v1/selection  {"range": "1d"}
//! - POST /api/v1/viewport   {"from": ISO8601, "to": ISO8601}
//! - GET  /api/v1/snapshot
//! - POST /api/v1/reload

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::dashboard::{Dashboard, DashboardSnapshot, Outcome, Viewport};
use crate::services::range_cache::RangeKey;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectionRequest {
    /// Display horizon ("1h", "3h", "6h", "12h", "1d", "1w", "1m", "3m", "1y", "2y")
    pub range: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ViewportRequest {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Result of a synchronous recomputation.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecomputeResponse {
    pub generation: u64,
    /// False when a newer request superseded this one before it finished
    pub published: bool,
}

impl From<Outcome> for RecomputeResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            generation: outcome.generation(),
            published: matches!(outcome, Outcome::Published(_)),
        }
    }
}

/// Viewport changes are processed in the background.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewportResponse {
    pub generation: u64,
}

/// Switch the displayed horizon and recompute.
#[utoipa::path(
    post,
    path = "/api/v1/selection",
    tag = "Session",
    request_body = SelectionRequest,
    responses(
        (status = 200, description = "Recomputed under a new generation", body = RecomputeResponse),
        (status = 400, description = "Unknown range", body = ErrorResponse),
        (status = 502, description = "Telemetry source unreachable or malformed", body = ErrorResponse),
    )
)]
pub async fn post_selection(
    State(dashboard): State<Dashboard>,
    Json(body): Json<SelectionRequest>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let range: RangeKey = body.range.parse()?;
    let outcome = dashboard.select_range(range).await?;
    Ok(Json(outcome.into()))
}

/// Pan/zoom. Returns immediately with the generation issued; the snapshot
/// follows once the viewport consumer has caught up.
#[utoipa::path(
    post,
    path = "/api/v1/viewport",
    tag = "Session",
    request_body = ViewportRequest,
    responses(
        (status = 200, description = "Viewport change queued", body = ViewportResponse),
        (status = 400, description = "Window start after end", body = ErrorResponse),
    )
)]
pub async fn post_viewport(
    State(dashboard): State<Dashboard>,
    Json(body): Json<ViewportRequest>,
) -> Result<Json<ViewportResponse>, AppError> {
    let viewport = Viewport::new(body.from, body.to)?;
    let generation = dashboard.change_viewport(viewport).await?;
    Ok(Json(ViewportResponse { generation }))
}

/// Last published snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/snapshot",
    tag = "Session",
    responses(
        (status = 200, description = "Latest snapshot", body = DashboardSnapshot),
        (status = 404, description = "Nothing published yet", body = ErrorResponse),
    )
)]
pub async fn get_snapshot(
    State(dashboard): State<Dashboard>,
) -> Result<Json<DashboardSnapshot>, AppError> {
    dashboard
        .latest_snapshot()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No snapshot published yet".to_string()))
}

/// Drop the whole cache and recompute from fresh retrievals.
#[utoipa::path(
    post,
    path = "/api/v1/reload",
    tag = "Session",
    responses(
        (status = 200, description = "Reloaded and recomputed", body = RecomputeResponse),
        (status = 502, description = "Telemetry source unreachable or malformed", body = ErrorResponse),
    )
)]
pub async fn post_reload(
    State(dashboard): State<Dashboard>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let outcome = dashboard.reload().await?;
    Ok(Json(outcome.into()))
}
