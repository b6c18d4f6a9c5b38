//! Chart data endpoints.
//!
//! - GET /api/v1/series/:metric?range=1d
//! - GET /api/v1/extrema/:metric?range=1d&from=ISO8601&to=ISO8601

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, ErrorResponse};
use crate::services::dashboard::{Dashboard, Viewport};
use crate::services::range_cache::RangeKey;
use crate::services::series::Sample;
use crate::services::telemetry::Metric;
use crate::services::window::{series_extrema, window_extrema, Extrema};

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct SeriesQuery {
    /// Display horizon ("1h", "3h", ... "2y"); defaults to the current selection
    pub range: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExtremaQuery {
    /// Display horizon; defaults to the current selection
    pub range: Option<String>,
    /// Window start in ISO 8601 format (inclusive)
    pub from: String,
    /// Window end in ISO 8601 format (inclusive)
    pub to: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct SeriesResponse {
    pub metric: Metric,
    pub unit: String,
    pub range: RangeKey,
    pub point_count: usize,
    pub points: Vec<Sample>,
    /// Min/max over the whole horizon, absent when there are no points
    pub extrema: Option<Extrema>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExtremaResponse {
    pub metric: Metric,
    pub range: RangeKey,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Absent when no sample falls inside the window
    pub extrema: Option<Extrema>,
}

async fn resolve_range(dashboard: &Dashboard, raw: Option<&str>) -> Result<RangeKey, AppError> {
    match raw {
        Some(r) => r.parse(),
        None => Ok(dashboard.selected_range().await),
    }
}

fn parse_time(raw: &str, name: &str) -> Result<DateTime<Utc>, AppError> {
    raw.parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid {} datetime: {}", name, e)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Cleaned series for one metric over a display horizon.
#[utoipa::path(
    get,
    path = "/api/v1/series/{metric}",
    tag = "Series",
    params(
        ("metric" = String, Path, description = "Metric name, e.g. \"pressure\""),
        SeriesQuery,
    ),
    responses(
        (status = 200, description = "Cleaned series", body = SeriesResponse),
        (status = 400, description = "Unknown metric or range", body = ErrorResponse),
        (status = 502, description = "Telemetry source unreachable or malformed", body = ErrorResponse),
    )
)]
pub async fn get_series(
    State(dashboard): State<Dashboard>,
    Path(metric): Path<String>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, AppError> {
    let metric: Metric = metric.parse()?;
    let range = resolve_range(&dashboard, params.range.as_deref()).await?;

    let data = dashboard
        .cache()
        .get_data_for_range(range, Utc::now())
        .await?;
    let series = data.get(metric);

    Ok(Json(SeriesResponse {
        metric,
        unit: metric.unit().to_string(),
        range,
        point_count: series.len(),
        extrema: series_extrema(&series),
        points: series.samples().to_vec(),
    }))
}

/// Min/max of one metric inside `[from, to]`.
#[utoipa::path(
    get,
    path = "/api/v1/extrema/{metric}",
    tag = "Series",
    params(
        ("metric" = String, Path, description = "Metric name, e.g. \"pressure\""),
        ExtremaQuery,
    ),
    responses(
        (status = 200, description = "Window extrema", body = ExtremaResponse),
        (status = 400, description = "Unknown metric/range or invalid window", body = ErrorResponse),
        (status = 502, description = "Telemetry source unreachable or malformed", body = ErrorResponse),
    )
)]
pub async fn get_extrema(
    State(dashboard): State<Dashboard>,
    Path(metric): Path<String>,
    Query(params): Query<ExtremaQuery>,
) -> Result<Json<ExtremaResponse>, AppError> {
    let metric: Metric = metric.parse()?;
    let range = resolve_range(&dashboard, params.range.as_deref()).await?;
    let window = Viewport::new(
        parse_time(&params.from, "from")?,
        parse_time(&params.to, "to")?,
    )?;

    let data = dashboard
        .cache()
        .get_data_for_range(range, Utc::now())
        .await?;

    Ok(Json(ExtremaResponse {
        metric,
        range,
        from: window.from,
        to: window.to,
        extrema: window_extrema(&data.get(metric), window.from, window.to),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{pressure_rows, test_dashboard};

    fn dashboard() -> Dashboard {
        // One sample every 30 minutes over two days, a peak 6 hours ago.
        let rows = pressure_rows(Utc::now(), 96, chrono::Duration::minutes(30), |i| {
            if i == 12 {
                1016.0
            } else {
                1013.0 - 0.01 * i as f64
            }
        });
        test_dashboard(rows).0
    }

    fn series_query(range: Option<&str>) -> Query<SeriesQuery> {
        Query(SeriesQuery {
            range: range.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_series_slices_to_range() {
        let Json(day) = get_series(
            State(dashboard()),
            Path("pressure".to_string()),
            series_query(Some("1d")),
        )
        .await
        .unwrap();

        assert_eq!(day.metric, Metric::Pressure);
        assert_eq!(day.unit, "hPa");
        assert_eq!(day.range, RangeKey::Day1);
        assert_eq!(day.point_count, day.points.len());
        assert!(day.point_count <= 49);
        assert_eq!(day.extrema.unwrap().max.value, 1016.0);
    }

    #[tokio::test]
    async fn test_series_defaults_to_selected_range() {
        let Json(resp) = get_series(
            State(dashboard()),
            Path("outdoor_humidity".to_string()),
            series_query(None),
        )
        .await
        .unwrap();
        assert_eq!(resp.range, RangeKey::Day1);
        // No humidity readings at all: empty, not an error.
        assert!(resp.points.is_empty());
        assert!(resp.extrema.is_none());
    }

    #[tokio::test]
    async fn test_series_rejects_unknown_metric_and_range() {
        let err = get_series(
            State(dashboard()),
            Path("wind".to_string()),
            series_query(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = get_series(
            State(dashboard()),
            Path("pressure".to_string()),
            series_query(Some("5d")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_extrema_window() {
        let now = Utc::now();
        let query = |from: DateTime<Utc>, to: DateTime<Utc>| {
            Query(ExtremaQuery {
                range: Some("1d".to_string()),
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            })
        };
        let d = dashboard();

        // Last 3 hours: the 6h-old peak is outside.
        let Json(recent) = get_extrema(
            State(d.clone()),
            Path("pressure".to_string()),
            query(now - chrono::Duration::hours(3), now + chrono::Duration::minutes(1)),
        )
        .await
        .unwrap();
        let e = recent.extrema.unwrap();
        assert!(e.max.value < 1016.0);

        // A window in the future is empty.
        let Json(empty) = get_extrema(
            State(d.clone()),
            Path("pressure".to_string()),
            query(now + chrono::Duration::hours(1), now + chrono::Duration::hours(2)),
        )
        .await
        .unwrap();
        assert!(empty.extrema.is_none());

        // Inverted window.
        let err = get_extrema(
            State(d),
            Path("pressure".to_string()),
            query(now, now - chrono::Duration::hours(1)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_extrema_bad_datetime() {
        let err = get_extrema(
            State(dashboard()),
            Path("pressure".to_string()),
            Query(ExtremaQuery {
                range: None,
                from: "yesterday".to_string(),
                to: "2026-03-01T00:00:00Z".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
