//! Named metrics, raw feed rows and the per-retrieval cleaning pass.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::services::series::{spike_filter, validate, RawValue, Series};

/// A physical quantity reported by the station.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Pressure,
    IndoorTemperature,
    IndoorHumidity,
    OutdoorTemperature,
    OutdoorHumidity,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Pressure,
        Metric::IndoorTemperature,
        Metric::IndoorHumidity,
        Metric::OutdoorTemperature,
        Metric::OutdoorHumidity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Pressure => "pressure",
            Metric::IndoorTemperature => "indoor_temperature",
            Metric::IndoorHumidity => "indoor_humidity",
            Metric::OutdoorTemperature => "outdoor_temperature",
            Metric::OutdoorHumidity => "outdoor_humidity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Pressure => "hPa",
            Metric::IndoorTemperature | Metric::OutdoorTemperature => "°C",
            Metric::IndoorHumidity | Metric::OutdoorHumidity => "%",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Unknown metric '{}'", s)))
    }
}

/// One feed entry after schema mapping: its raw timestamp plus whichever
/// metrics carried a non-null value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub created_at: String,
    pub readings: BTreeMap<Metric, RawValue>,
}

/// Cleaned series for every configured metric from a single retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySet {
    series: BTreeMap<Metric, Series>,
}

impl TelemetrySet {
    pub fn new(series: BTreeMap<Metric, Series>) -> Self {
        Self { series }
    }

    /// The series for `metric`; empty if the metric is not in the schema.
    pub fn get(&self, metric: Metric) -> Series {
        self.series.get(&metric).cloned().unwrap_or_default()
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.series.keys().copied()
    }

    /// Total points across all metrics.
    pub fn point_count(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    /// Apply `f` to every series, producing a new set.
    pub fn map(&self, f: impl Fn(&Series) -> Series) -> TelemetrySet {
        TelemetrySet::new(self.series.iter().map(|(m, s)| (*m, f(s))).collect())
    }
}

/// Validator then SpikeFilter, per metric in the schema.
///
/// Dropped readings are not errors; they only show up as a lower point count
/// in the debug log.
pub fn clean_rows(rows: &[RawRow], config: &PipelineConfig) -> Result<TelemetrySet, AppError> {
    let mut out = BTreeMap::new();
    for metric in config.fields.metrics() {
        let limits = config.limits_for(metric);
        let validated = validate(
            rows.iter()
                .map(|r| (r.created_at.as_str(), r.readings.get(&metric))),
            limits.range,
        )?;
        let filtered = spike_filter(&validated, limits.max_step);

        let dropped = rows.len() - filtered.len();
        if dropped > 0 {
            tracing::debug!(
                "Cleaned {}: {} rows → {} valid → {} after spike filter",
                metric,
                rows.len(),
                validated.len(),
                filtered.len()
            );
        }
        out.insert(metric, filtered);
    }
    Ok(TelemetrySet::new(out))
}
