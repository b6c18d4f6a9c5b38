//! Session cache of cleaned telemetry, keyed by display horizon.
//!
//! Each `RangeKey` maps to a fixed duration, a requested sample count and a
//! parent horizon. A key is fetched at most once per session: concurrent
//! callers for the same key share one in-flight retrieval, and once stored an
//! entry is never refreshed except by `reload`, which drops everything.
//!
//! Shorter horizons that are not cached themselves are sliced out of the
//! nearest cached (or in-flight) ancestor, falling back to loading the root.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::services::telemetry::{clean_rows, TelemetrySet};
use crate::services::thingspeak::TelemetrySource;

/// Display horizon.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum RangeKey {
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "3h")]
    Hour3,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1m")]
    Month1,
    #[serde(rename = "3m")]
    Month3,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
}

impl RangeKey {
    pub const ALL: [RangeKey; 10] = [
        RangeKey::Hour1,
        RangeKey::Hour3,
        RangeKey::Hour6,
        RangeKey::Hour12,
        RangeKey::Day1,
        RangeKey::Week1,
        RangeKey::Month1,
        RangeKey::Month3,
        RangeKey::Year1,
        RangeKey::Year2,
    ];

    /// The largest horizon; the end of every parent chain.
    pub const ROOT: RangeKey = RangeKey::Year2;

    pub fn as_str(self) -> &'static str {
        match self {
            RangeKey::Hour1 => "1h",
            RangeKey::Hour3 => "3h",
            RangeKey::Hour6 => "6h",
            RangeKey::Hour12 => "12h",
            RangeKey::Day1 => "1d",
            RangeKey::Week1 => "1w",
            RangeKey::Month1 => "1m",
            RangeKey::Month3 => "3m",
            RangeKey::Year1 => "1y",
            RangeKey::Year2 => "2y",
        }
    }

    pub fn duration(self) -> chrono::Duration {
        match self {
            RangeKey::Hour1 => chrono::Duration::hours(1),
            RangeKey::Hour3 => chrono::Duration::hours(3),
            RangeKey::Hour6 => chrono::Duration::hours(6),
            RangeKey::Hour12 => chrono::Duration::hours(12),
            RangeKey::Day1 => chrono::Duration::days(1),
            RangeKey::Week1 => chrono::Duration::days(7),
            RangeKey::Month1 => chrono::Duration::days(30),
            RangeKey::Month3 => chrono::Duration::days(90),
            RangeKey::Year1 => chrono::Duration::days(365),
            RangeKey::Year2 => chrono::Duration::days(730),
        }
    }

    /// Next larger horizon, `None` for the root.
    pub fn parent(self) -> Option<RangeKey> {
        match self {
            RangeKey::Hour1 => Some(RangeKey::Hour3),
            RangeKey::Hour3 => Some(RangeKey::Hour6),
            RangeKey::Hour6 => Some(RangeKey::Hour12),
            RangeKey::Hour12 => Some(RangeKey::Day1),
            RangeKey::Day1 => Some(RangeKey::Week1),
            RangeKey::Week1 => Some(RangeKey::Month1),
            RangeKey::Month1 => Some(RangeKey::Month3),
            RangeKey::Month3 => Some(RangeKey::Year1),
            RangeKey::Year1 => Some(RangeKey::Year2),
            RangeKey::Year2 => None,
        }
    }

    /// Feed rows requested when this horizon is fetched directly. Capped by
    /// the ThingSpeak per-call maximum from 3m upwards.
    pub fn requested_samples(self) -> u32 {
        match self {
            RangeKey::Hour1 => 120,
            RangeKey::Hour3 => 360,
            RangeKey::Hour6 => 720,
            RangeKey::Hour12 => 1440,
            RangeKey::Day1 => 2000,
            RangeKey::Week1 => 4000,
            RangeKey::Month1 => 6000,
            RangeKey::Month3 | RangeKey::Year1 | RangeKey::Year2 => 8000,
        }
    }

    /// This key followed by its ancestors up to the root.
    pub fn chain(self) -> impl Iterator<Item = RangeKey> {
        std::iter::successors(Some(self), |k| k.parent())
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Unknown range '{}'", s)))
    }
}

/// One retrieval, cleaned. Immutable once stored.
#[derive(Debug)]
pub struct CacheEntry {
    pub range: RangeKey,
    pub telemetry: TelemetrySet,
    pub fetched_at: DateTime<Utc>,
}

type PendingFetch = Shared<BoxFuture<'static, Result<Arc<CacheEntry>, AppError>>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<RangeKey, Arc<CacheEntry>>,
    in_flight: HashMap<RangeKey, PendingFetch>,
    /// Bumped by `reload`; fetches started under an older epoch never store.
    epoch: u64,
}

/// Shared handle to the session cache.
#[derive(Clone)]
pub struct RangeCache {
    source: Arc<dyn TelemetrySource>,
    pipeline: Arc<PipelineConfig>,
    fetch_timeout: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl RangeCache {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        pipeline: Arc<PipelineConfig>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            pipeline,
            fetch_timeout,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Stored entry for `key`, if any.
    pub fn cached(&self, key: RangeKey) -> Option<Arc<CacheEntry>> {
        lock(&self.state).entries.get(&key).cloned()
    }

    /// Keys with a stored entry, smallest horizon first.
    pub fn cached_keys(&self) -> Vec<RangeKey> {
        let mut keys: Vec<_> = lock(&self.state).entries.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Return the entry for `key`, fetching it if needed.
    ///
    /// Concurrent calls for a key that is not yet stored all await the same
    /// retrieval. A failed retrieval stores nothing.
    pub async fn load_range(&self, key: RangeKey) -> Result<Arc<CacheEntry>, AppError> {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(entry) = state.entries.get(&key) {
                return Ok(entry.clone());
            }
            let joined = state.in_flight.get(&key).cloned();
            match joined {
                Some(pending) => {
                    tracing::debug!("Range {}: joining in-flight fetch", key);
                    pending
                }
                None => {
                    let pending = self.start_fetch(key, state.epoch);
                    state.in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Data for `key`: the stored entry if present, otherwise the nearest
    /// cached or in-flight ancestor (the root if none) restricted to
    /// `timestamp >= now - duration(key)`. Derived data is not stored under
    /// `key`.
    pub async fn get_data_for_range(
        &self,
        key: RangeKey,
        now: DateTime<Utc>,
    ) -> Result<TelemetrySet, AppError> {
        let source_key = {
            let state = lock(&self.state);
            key.chain()
                .find(|k| state.entries.contains_key(k) || state.in_flight.contains_key(k))
                .unwrap_or(RangeKey::ROOT)
        };

        let entry = self.load_range(source_key).await?;
        if source_key == key {
            return Ok(entry.telemetry.clone());
        }

        let cutoff = now - key.duration();
        tracing::debug!("Range {} derived from cached {}", key, source_key);
        Ok(entry.telemetry.map(|s| s.since(cutoff)))
    }

    /// Drop every entry. Fetches still running will not store their result.
    pub fn reload(&self) {
        let mut state = lock(&self.state);
        state.epoch += 1;
        let dropped = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        tracing::info!("Range cache reloaded, {} entries discarded", dropped);
    }

    fn start_fetch(&self, key: RangeKey, epoch: u64) -> PendingFetch {
        let source = self.source.clone();
        let pipeline = self.pipeline.clone();
        let timeout = self.fetch_timeout;
        let state = self.state.clone();

        async move {
            let result = fetch_entry(source.as_ref(), &pipeline, key, timeout).await;
            settle(&state, key, epoch, &result);
            result
        }
        .boxed()
        .shared()
    }
}

async fn fetch_entry(
    source: &dyn TelemetrySource,
    pipeline: &PipelineConfig,
    key: RangeKey,
    timeout: Duration,
) -> Result<Arc<CacheEntry>, AppError> {
    let requested = key.requested_samples();
    let rows = tokio::time::timeout(timeout, source.fetch_recent(requested))
        .await
        .map_err(|_| {
            AppError::Fetch(format!("Telemetry fetch for {} timed out after {:?}", key, timeout))
        })??;

    let telemetry = clean_rows(&rows, pipeline)?;
    tracing::info!(
        "Range {}: fetched {} rows ({} requested), {} clean points",
        key,
        rows.len(),
        requested,
        telemetry.point_count()
    );

    Ok(Arc::new(CacheEntry {
        range: key,
        telemetry,
        fetched_at: Utc::now(),
    }))
}

fn settle(
    state: &Mutex<CacheState>,
    key: RangeKey,
    epoch: u64,
    result: &Result<Arc<CacheEntry>, AppError>,
) {
    let mut state = lock(state);
    if state.epoch != epoch {
        tracing::debug!("Range {}: fetch finished after reload, result not stored", key);
        return;
    }
    state.in_flight.remove(&key);
    match result {
        Ok(entry) => {
            state.entries.insert(key, entry.clone());
        }
        Err(e) => tracing::warn!("Range {}: fetch failed: {}", key, e),
    }
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    // The critical sections never panic midway, so a poisoned map is intact.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
