//! Background refresher.
//!
//! Re-runs the dashboard pipeline for the current selection on a fixed
//! interval. It never reloads the cache, so between manual reloads a refresh
//! only re-derives slices and extrema from data already held. Each cycle is a
//! normal generation, so a user action issued mid-cycle still wins.
//!
//! State is in-memory (`Arc<RwLock<RefresherState>>`) and exposed through the
//! status endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::services::dashboard::{Dashboard, Outcome};

/// Refresher status, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefresherState {
    pub active: bool,
    pub interval_secs: u64,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_refresh_completed_at: Option<DateTime<Utc>>,
    pub last_refresh_duration_ms: Option<u64>,
    /// "published", "superseded", "error", or "pending"
    pub last_result: String,
    pub last_error: Option<String>,
    pub total_refreshes: u64,
}

impl RefresherState {
    pub fn new(interval: Duration) -> Self {
        Self {
            active: true,
            interval_secs: interval.as_secs(),
            next_refresh_at: None,
            last_refresh_completed_at: None,
            last_refresh_duration_ms: None,
            last_result: "pending".to_string(),
            last_error: None,
            total_refreshes: 0,
        }
    }
}

/// Shared refresher state handle.
pub type SharedRefresherState = Arc<RwLock<RefresherState>>;

/// Run the refresher. Never returns; spawn it with `tokio::spawn`.
///
/// The first cycle runs immediately so a snapshot exists right after startup.
pub async fn run_refresher(dashboard: Dashboard, state: SharedRefresherState, interval: Duration) {
    tracing::info!("Refresher started, interval {}s", interval.as_secs());

    loop {
        refresh_once(&dashboard, &state, interval).await;
        tokio::time::sleep(interval).await;
    }
}

/// One refresh cycle: recompute, then record the outcome.
pub(crate) async fn refresh_once(
    dashboard: &Dashboard,
    state: &SharedRefresherState,
    interval: Duration,
) {
    let started = Utc::now();
    let result = dashboard.recompute().await;
    let finished = Utc::now();

    let (label, error) = match &result {
        Ok(Outcome::Published(snapshot)) => {
            tracing::debug!("Refresher: generation {} published", snapshot.generation);
            ("published", None)
        }
        Ok(Outcome::Superseded { generation, latest }) => {
            tracing::debug!(
                "Refresher: generation {} superseded by {}",
                generation,
                latest
            );
            ("superseded", None)
        }
        Err(e) => {
            tracing::warn!("Refresher: recomputation failed: {}", e);
            ("error", Some(e.to_string()))
        }
    };

    let mut s = state.write().await;
    s.total_refreshes += 1;
    s.last_result = label.to_string();
    s.last_error = error;
    s.last_refresh_completed_at = Some(finished);
    s.last_refresh_duration_ms = u64::try_from((finished - started).num_milliseconds()).ok();
    s.next_refresh_at = chrono::Duration::from_std(interval)
        .ok()
        .map(|d| finished + d);
}
