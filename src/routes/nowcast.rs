//! Nowcast endpoint.
//!
//! GET /api/v1/nowcast: always computed from the 1d horizon, whatever range
//! the renderer currently shows.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::dashboard::Dashboard;
use crate::services::forecast::ForecastResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct NowcastResponse {
    /// False when the last 24h hold fewer than 3 pressure samples
    pub available: bool,
    pub computed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastResult>,
}

/// Current nowcast.
///
/// Insufficient data is a normal state and still returns 200 with
/// `available: false`.
#[utoipa::path(
    get,
    path = "/api/v1/nowcast",
    tag = "Nowcast",
    responses(
        (status = 200, description = "Nowcast, or availability flag", body = NowcastResponse),
        (status = 502, description = "Telemetry source unreachable or malformed", body = ErrorResponse),
    )
)]
pub async fn get_nowcast(
    State(dashboard): State<Dashboard>,
) -> Result<Json<NowcastResponse>, AppError> {
    let now = Utc::now();
    let forecast = dashboard.nowcast(now).await?;
    Ok(Json(NowcastResponse {
        available: forecast.is_some(),
        computed_at: now,
        forecast,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::forecast::{ForecastIcon, PressureLevel, PressureTrend};
    use crate::services::test_support::{pressure_rows, test_dashboard, with_outdoor};

    #[tokio::test]
    async fn test_nowcast_high_and_rising_is_clear() {
        // +0.9 hPa/hour, ending at 1025: Δp3h = +2.7.
        let rows = pressure_rows(Utc::now(), 12, chrono::Duration::hours(1), |i| {
            1025.0 - 0.9 * i as f64
        });
        let (dashboard, _rx) = test_dashboard(with_outdoor(rows, 15.0, 50.0));

        let Json(resp) = get_nowcast(State(dashboard)).await.unwrap();
        assert!(resp.available);
        let forecast = resp.forecast.unwrap();
        assert_eq!(forecast.icon, ForecastIcon::Clear);
        assert_eq!(forecast.trend, PressureTrend::Up);
        assert_eq!(forecast.pressure_level, PressureLevel::High);
        assert!(!forecast.ice_risk);
    }

    #[tokio::test]
    async fn test_nowcast_unavailable_with_two_samples() {
        let rows = pressure_rows(Utc::now(), 1, chrono::Duration::hours(1), |_| 1013.0);
        let (dashboard, _rx) = test_dashboard(rows);

        let Json(resp) = get_nowcast(State(dashboard)).await.unwrap();
        assert!(!resp.available);
        assert!(resp.forecast.is_none());
    }

    #[tokio::test]
    async fn test_nowcast_ignores_stale_history() {
        // Plenty of samples, but all older than a day.
        let end = Utc::now() - chrono::Duration::days(3);
        let rows = pressure_rows(end, 24, chrono::Duration::hours(1), |_| 1013.0);
        let (dashboard, _rx) = test_dashboard(rows);

        let Json(resp) = get_nowcast(State(dashboard)).await.unwrap();
        assert!(!resp.available);
    }
}
