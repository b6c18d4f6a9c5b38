// Barometer Nowcast API v0.1
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;

use config::{AppConfig, LogFormat};
use services::dashboard::{run_viewport_consumer, Dashboard};
use services::range_cache::{RangeCache, RangeKey};
use services::refresher::{run_refresher, RefresherState, SharedRefresherState};
use services::thingspeak::ThingSpeakClient;

/// Horizon shown before the renderer selects one.
const INITIAL_RANGE: RangeKey = RangeKey::Day1;

/// Barometer Nowcast API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Barometer Nowcast API",
        version = "0.1.0",
        description = "Cleans indoor/outdoor weather station telemetry from a ThingSpeak \
            channel into chartable series, keeps a per-horizon session cache with \
            coalesced retrievals, and derives a short-horizon pressure-based nowcast.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Series", description = "Cleaned telemetry series and window extrema"),
        (name = "Nowcast", description = "Pressure-tendency nowcast"),
        (name = "Session", description = "Range selection, viewport and published snapshot"),
        (name = "Refresher", description = "Background refresher status"),
    ),
    paths(
        routes::health::health_check,
        routes::series::get_series,
        routes::series::get_extrema,
        routes::nowcast::get_nowcast,
        routes::session::post_selection,
        routes::session::post_viewport,
        routes::session::get_snapshot,
        routes::session::post_reload,
        routes::refresher::get_refresher_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::series::SeriesResponse,
            routes::series::ExtremaResponse,
            routes::nowcast::NowcastResponse,
            routes::session::SelectionRequest,
            routes::session::ViewportRequest,
            routes::session::RecomputeResponse,
            routes::session::ViewportResponse,
            services::dashboard::DashboardSnapshot,
            services::dashboard::MetricView,
            services::dashboard::Viewport,
            services::forecast::ForecastResult,
            services::forecast::ForecastIcon,
            services::forecast::PressureLevel,
            services::forecast::PressureTrend,
            services::range_cache::RangeKey,
            services::refresher::RefresherState,
            services::series::Sample,
            services::telemetry::Metric,
            services::window::Extrema,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");

    // Initialize tracing
    let (pretty, json) = match config.log_format {
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barometer_nowcast_api=debug,tower_http=debug".into()),
        )
        .with(pretty)
        .with(json)
        .init();

    tracing::info!(
        "ThingSpeak channel {} at {}, fields: {:?}",
        config.channel_id,
        config.thingspeak_base_url,
        config.pipeline.fields
    );

    let client = ThingSpeakClient::new(
        &config.thingspeak_base_url,
        config.channel_id,
        config.api_key.clone(),
        config.pipeline.fields.clone(),
    )
    .expect("Failed to create ThingSpeak client");

    let cache = RangeCache::new(
        Arc::new(client),
        Arc::new(config.pipeline.clone()),
        config.fetch_timeout,
    );
    let (dashboard, viewport_rx) = Dashboard::new(cache, INITIAL_RANGE);

    // Viewport consumer and background refresher
    tokio::spawn(run_viewport_consumer(dashboard.clone(), viewport_rx));

    let refresher_state: SharedRefresherState =
        Arc::new(RwLock::new(RefresherState::new(config.refresh_interval)));
    tokio::spawn(run_refresher(
        dashboard.clone(),
        refresher_state.clone(),
        config.refresh_interval,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    let dashboard_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/series/:metric", get(routes::series::get_series))
        .route("/api/v1/extrema/:metric", get(routes::series::get_extrema))
        .route("/api/v1/nowcast", get(routes::nowcast::get_nowcast))
        .route("/api/v1/selection", post(routes::session::post_selection))
        .route("/api/v1/viewport", post(routes::session::post_viewport))
        .route("/api/v1/snapshot", get(routes::session::get_snapshot))
        .route("/api/v1/reload", post(routes::session::post_reload))
        .with_state(dashboard);

    let refresher_routes = Router::new()
        .route(
            "/api/v1/refresher/status",
            get(routes::refresher::get_refresher_status),
        )
        .with_state(refresher_state);

    let app = Router::new()
        .merge(dashboard_routes)
        .merge(refresher_routes)
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "OpenAPI document at http://localhost:{}/api-docs/openapi.json",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
