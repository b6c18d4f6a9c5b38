use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::dashboard::Dashboard;
use crate::services::range_cache::RangeKey;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    /// API version
    pub version: String,
    /// Horizons currently held in the session cache
    pub cached_ranges: Vec<RangeKey>,
    /// Latest generation issued (0 before the first recomputation)
    pub latest_generation: u64,
}

/// Health check endpoint.
///
/// Never touches the telemetry source, so it stays fast and green while
/// ThingSpeak is down. Cache contents show how warm the session is.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(dashboard): State<Dashboard>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_ranges: dashboard.cache().cached_keys(),
        latest_generation: dashboard.generations().latest(),
    })
}
