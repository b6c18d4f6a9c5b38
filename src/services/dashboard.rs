//! Session orchestration: selection, viewport, and the published snapshot.
//!
//! Every recomputation (range selection, pan/zoom, timer refresh, reload) is
//! tagged with a generation from one monotonically increasing counter. Work is
//! never aborted; a result is simply dropped at publish time when a newer
//! generation has been issued meanwhile, so a slow early request can never
//! overwrite a faster later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::forecast::{nowcast, ForecastResult};
use crate::services::range_cache::{RangeCache, RangeKey};
use crate::services::series::Sample;
use crate::services::telemetry::{Metric, TelemetrySet};
use crate::services::window::{series_extrema, window_extrema, Extrema};

/// Horizon the nowcast is always computed from, whatever is on screen.
const NOWCAST_RANGE: RangeKey = RangeKey::Day1;

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

/// Monotonic request counter. Generation 0 is never issued.
#[derive(Debug, Clone, Default)]
pub struct Generations(Arc<AtomicU64>);

impl Generations {
    pub fn issue(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Visible time window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Viewport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Viewport {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, AppError> {
        if from > to {
            return Err(AppError::BadRequest(format!(
                "Viewport start {} is after end {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(Self { from, to })
    }
}

/// A pan/zoom notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportChange {
    pub viewport: Viewport,
    pub generation: u64,
}

/// One metric as the renderer draws it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricView {
    pub metric: Metric,
    /// Display unit ("hPa", "°C" or "%")
    pub unit: String,
    pub points: Vec<Sample>,
    /// Min/max inside the viewport, or over the whole range without one
    pub extrema: Option<Extrema>,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSnapshot {
    pub generation: u64,
    pub range: RangeKey,
    pub viewport: Option<Viewport>,
    pub computed_at: DateTime<Utc>,
    pub metrics: Vec<MetricView>,
    /// Absent when there are fewer than 3 pressure samples in the last 24h
    pub nowcast: Option<ForecastResult>,
}

/// What happened to a recomputation.
#[derive(Debug, Clone)]
pub enum Outcome {
    Published(DashboardSnapshot),
    /// A newer generation was issued before this one finished.
    Superseded { generation: u64, latest: u64 },
}

impl Outcome {
    pub fn generation(&self) -> u64 {
        match self {
            Outcome::Published(s) => s.generation,
            Outcome::Superseded { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Selection {
    range: RangeKey,
    viewport: Option<Viewport>,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Shared session handle.
#[derive(Clone)]
pub struct Dashboard {
    cache: RangeCache,
    generations: Generations,
    selection: Arc<RwLock<Selection>>,
    snapshot: Arc<RwLock<Option<DashboardSnapshot>>>,
    viewport_tx: mpsc::UnboundedSender<ViewportChange>,
}

impl Dashboard {
    /// Returns the dashboard and the receiving end of its viewport channel,
    /// to be handed to `run_viewport_consumer`.
    pub fn new(
        cache: RangeCache,
        initial_range: RangeKey,
    ) -> (Self, mpsc::UnboundedReceiver<ViewportChange>) {
        let (viewport_tx, viewport_rx) = mpsc::unbounded_channel();
        let dashboard = Self {
            cache,
            generations: Generations::default(),
            selection: Arc::new(RwLock::new(Selection {
                range: initial_range,
                viewport: None,
            })),
            snapshot: Arc::new(RwLock::new(None)),
            viewport_tx,
        };
        (dashboard, viewport_rx)
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    pub async fn selected_range(&self) -> RangeKey {
        self.selection.read().await.range
    }

    pub async fn latest_snapshot(&self) -> Option<DashboardSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Recompute the current selection under a fresh generation.
    pub async fn recompute(&self) -> Result<Outcome, AppError> {
        let generation = self.generations.issue();
        self.run_generation(generation).await
    }

    /// Switch the displayed horizon. Clears any zoom.
    pub async fn select_range(&self, range: RangeKey) -> Result<Outcome, AppError> {
        {
            let mut sel = self.selection.write().await;
            sel.range = range;
            sel.viewport = None;
        }
        tracing::debug!("Range selected: {}", range);
        self.recompute().await
    }

    /// Record a pan/zoom and queue it for the viewport consumer. Returns the
    /// generation the change was issued under.
    pub async fn change_viewport(&self, viewport: Viewport) -> Result<u64, AppError> {
        self.selection.write().await.viewport = Some(viewport);
        let generation = self.generations.issue();
        self.viewport_tx
            .send(ViewportChange {
                viewport,
                generation,
            })
            .map_err(|_| AppError::Internal("Viewport consumer is not running".to_string()))?;
        Ok(generation)
    }

    /// Manual reload: drop the whole cache, then recompute.
    pub async fn reload(&self) -> Result<Outcome, AppError> {
        self.cache.reload();
        self.recompute().await
    }

    /// Nowcast from the 1d horizon, `None` on insufficient data.
    pub async fn nowcast(&self, now: DateTime<Utc>) -> Result<Option<ForecastResult>, AppError> {
        let data = self.cache.get_data_for_range(NOWCAST_RANGE, now).await?;
        Ok(nowcast(&data, &self.cache.pipeline().forecast))
    }

    /// Run the pipeline for the current selection and publish if `generation`
    /// is still the latest.
    pub(crate) async fn run_generation(&self, generation: u64) -> Result<Outcome, AppError> {
        let selection = *self.selection.read().await;
        let now = Utc::now();

        let (data, forecast) = futures::try_join!(
            self.cache.get_data_for_range(selection.range, now),
            self.nowcast(now),
        )?;

        let snapshot = DashboardSnapshot {
            generation,
            range: selection.range,
            viewport: selection.viewport,
            computed_at: now,
            metrics: build_views(&data, selection.viewport),
            nowcast: forecast,
        };
        Ok(self.publish(snapshot).await)
    }

    async fn publish(&self, snapshot: DashboardSnapshot) -> Outcome {
        let mut slot = self.snapshot.write().await;
        let latest = self.generations.latest();
        if snapshot.generation != latest {
            tracing::debug!(
                "Discarding stale generation {} (latest {})",
                snapshot.generation,
                latest
            );
            return Outcome::Superseded {
                generation: snapshot.generation,
                latest,
            };
        }
        *slot = Some(snapshot.clone());
        Outcome::Published(snapshot)
    }
}

fn build_views(data: &TelemetrySet, viewport: Option<Viewport>) -> Vec<MetricView> {
    data.metrics()
        .map(|metric| {
            let series = data.get(metric);
            let extrema = match viewport {
                Some(v) => window_extrema(&series, v.from, v.to),
                None => series_extrema(&series),
            };
            MetricView {
                metric,
                unit: metric.unit().to_string(),
                points: series.samples().to_vec(),
                extrema,
            }
        })
        .collect()
}

/// Drain viewport notifications, skipping any that a newer request has
/// already superseded. Runs until the dashboard is dropped.
pub async fn run_viewport_consumer(
    dashboard: Dashboard,
    mut rx: mpsc::UnboundedReceiver<ViewportChange>,
) {
    while let Some(change) = rx.recv().await {
        if !dashboard.generations.is_current(change.generation) {
            tracing::debug!("Skipping stale viewport generation {}", change.generation);
            continue;
        }
        match dashboard.run_generation(change.generation).await {
            Ok(Outcome::Published(_)) => tracing::debug!(
                "Viewport {} → {} published (generation {})",
                change.viewport.from,
                change.viewport.to,
                change.generation
            ),
            Ok(Outcome::Superseded { .. }) => {}
            Err(e) => tracing::warn!("Viewport recomputation failed: {}", e),
        }
    }
}
