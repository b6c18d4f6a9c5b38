//! Extrema over the visible chart window.
//!
//! Recomputed in full on every pan/zoom: one linear scan, no sorting, no
//! index, no memory of earlier calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::series::{Sample, Series};

/// Lowest and highest sample inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Extrema {
    pub min: Sample,
    pub max: Sample,
}

/// Min/max samples with `t0 <= timestamp <= t1`, or `None` if the window is
/// empty. Comparisons are strict, so ties keep the earliest sample.
pub fn window_extrema(series: &Series, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Option<Extrema> {
    let mut min: Option<Sample> = None;
    let mut max: Option<Sample> = None;

    for s in series
        .iter()
        .filter(|s| s.timestamp >= t0 && s.timestamp <= t1)
    {
        if min.map_or(true, |m| s.value < m.value) {
            min = Some(*s);
        }
        if max.map_or(true, |m| s.value > m.value) {
            max = Some(*s);
        }
    }

    Some(Extrema {
        min: min?,
        max: max?,
    })
}

/// Extrema over the whole series.
pub fn series_extrema(series: &Series) -> Option<Extrema> {
    let (first, last) = (series.first()?, series.last()?);
    window_extrema(series, first.timestamp, last.timestamp)
}
