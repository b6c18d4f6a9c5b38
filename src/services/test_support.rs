//! Test doubles shared by the service and route tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::services::dashboard::{Dashboard, ViewportChange};
use crate::services::range_cache::{RangeCache, RangeKey};
use crate::services::series::RawValue;
use crate::services::telemetry::{Metric, RawRow};
use crate::services::thingspeak::TelemetrySource;

/// In-memory telemetry source that counts calls. Ignores `results` and always
/// returns every row.
pub(crate) struct MockSource {
    pub(crate) rows: Vec<RawRow>,
    pub(crate) delay: Duration,
    pub(crate) fail: bool,
    calls: AtomicUsize,
    requested: Mutex<Vec<u32>>,
}

impl MockSource {
    pub(crate) fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            delay: Duration::from_millis(0),
            fail: false,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `results` of every call so far, in call order.
    pub(crate) fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

impl TelemetrySource for MockSource {
    fn fetch_recent(&self, results: u32) -> BoxFuture<'_, Result<Vec<RawRow>, AppError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(results);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(AppError::Fetch("ThingSpeak returned HTTP 500".to_string()))
            } else {
                Ok(self.rows.clone())
            }
        }
        .boxed()
    }
}

/// `n + 1` pressure rows spaced `step` apart, oldest first, the last one at
/// `end`. `value(i)` gets the number of steps back from `end`.
pub(crate) fn pressure_rows(
    end: DateTime<Utc>,
    n: i32,
    step: chrono::Duration,
    value: impl Fn(i32) -> f64,
) -> Vec<RawRow> {
    (0..=n)
        .rev()
        .map(|i| RawRow {
            created_at: (end - step * i).to_rfc3339(),
            readings: BTreeMap::from([(Metric::Pressure, RawValue::Text(format!("{:.1}", value(i))))]),
        })
        .collect()
}

/// Adds outdoor temperature and humidity readings to every row.
pub(crate) fn with_outdoor(mut rows: Vec<RawRow>, temperature: f64, humidity: f64) -> Vec<RawRow> {
    for row in &mut rows {
        row.readings
            .insert(Metric::OutdoorTemperature, RawValue::Number(temperature));
        row.readings
            .insert(Metric::OutdoorHumidity, RawValue::Number(humidity));
    }
    rows
}

/// A dashboard over an in-memory source, initially showing `1d`.
pub(crate) fn test_dashboard(
    rows: Vec<RawRow>,
) -> (Dashboard, mpsc::UnboundedReceiver<ViewportChange>) {
    let cache = RangeCache::new(
        Arc::new(MockSource::new(rows)),
        Arc::new(PipelineConfig::default()),
        Duration::from_secs(5),
    );
    Dashboard::new(cache, RangeKey::Day1)
}
