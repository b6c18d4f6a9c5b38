//! Refresher status HTTP endpoint.
//!
//! GET /api/v1/refresher/status: current state of the background refresher.

use axum::extract::State;
use axum::Json;

use crate::services::refresher::{RefresherState, SharedRefresherState};

/// Get the current refresher status.
#[utoipa::path(
    get,
    path = "/api/v1/refresher/status",
    tag = "Refresher",
    responses(
        (status = 200, description = "Current refresher status", body = RefresherState),
    )
)]
pub async fn get_refresher_status(
    State(state): State<SharedRefresherState>,
) -> Json<RefresherState> {
    let s = state.read().await;
    Json(s.clone())
}
