//! Time-series primitives plus the two cleaning passes: range validation and
//! the bounded-delta spike filter.
//!
//! Every stage takes a `&Series` and returns a new `Series`; nothing is
//! mutated in place once produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::helpers::parse_feed_timestamp;

/// A single timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Sample {
    /// Sample time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Reading in the metric's unit (hPa, °C or %)
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered samples, non-decreasing by timestamp.
///
/// Duplicate timestamps are passed through as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Samples with `timestamp >= cutoff`, order preserved.
    pub fn since(&self, cutoff: DateTime<Utc>) -> Series {
        self.iter().filter(|s| s.timestamp >= cutoff).copied().collect()
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Series::new(iter.into_iter().collect())
    }
}

/// Closed validity interval for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// A reading exactly as the source delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Numeric interpretation of the reading, if any. Text is trimmed first.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// `true` iff `v` is finite and `min <= v <= max`.
pub fn is_valid(v: f64, range: ValueRange) -> bool {
    v.is_finite() && v >= range.min && v <= range.max
}

/// Validate one metric's readings into a `Series`.
///
/// `rows` yields `(created_at, reading)` pairs in source order. Readings that
/// fail to parse or fall outside `range` are dropped silently; an unparseable
/// timestamp is structural and aborts the whole batch.
pub fn validate<'a, I>(rows: I, range: ValueRange) -> Result<Series, AppError>
where
    I: IntoIterator<Item = (&'a str, Option<&'a RawValue>)>,
{
    let mut samples = Vec::new();
    for (created_at, reading) in rows {
        let timestamp = parse_feed_timestamp(created_at).ok_or_else(|| {
            AppError::Structural(format!("unparseable timestamp '{}'", created_at))
        })?;

        let Some(value) = reading.and_then(RawValue::to_f64) else {
            continue;
        };
        if is_valid(value, range) {
            samples.push(Sample::new(timestamp, value));
        }
    }
    Ok(Series::new(samples))
}

/// Greedy left-to-right spike suppression.
///
/// The first sample is always kept; each later sample is kept only if it lies
/// within `max_step` of the last *kept* sample. No backtracking: after a
/// genuine step change larger than `max_step`, later samples keep being
/// compared against the stale pre-step value and are rejected until one
/// happens to land back within range.
pub fn spike_filter(series: &Series, max_step: f64) -> Series {
    if series.len() < 2 {
        return series.clone();
    }

    let mut kept: Vec<Sample> = Vec::with_capacity(series.len());
    for sample in series.iter() {
        let within_step = kept
            .last()
            .map_or(true, |last| (sample.value - last.value).abs() <= max_step);
        if within_step {
            kept.push(*sample);
        }
    }
    Series::new(kept)
}
