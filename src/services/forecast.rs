//! Pressure-tendency nowcast.
//!
//! Builds a feature vector from the last 24 hours of station pressure plus the
//! outdoor humidity/temperature series, then runs a fixed decision table:
//!
//! 1. Pressure level from the latest reading (high / normal / low).
//! 2. Trend from the 3-hour pressure change.
//! 3. Instability index from multi-window pressure volatility and rising
//!    humidity, modulated by season.
//! 4. Primary decision on trend, then level, then instability.
//! 5. Cold-weather override (snow / ice / frost), which has the final say.
//!
//! Everything here is pure: same series in, same result out.

use std::f64::consts::PI;

use chrono::Timelike;
use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::{day_of_year, hours};
use crate::services::series::Series;
use crate::services::telemetry::{Metric, TelemetrySet};

// Instability weights per |Δp| window.
const W_DP3H: f64 = 1.0;
const W_DP6H: f64 = 0.5;
const W_DP1H: f64 = 0.3;
/// Per % of outdoor humidity above `HUMIDITY_BASELINE_PCT`.
const W_HUMIDITY: f64 = 0.02;
const HUMIDITY_BASELINE_PCT: f64 = 70.0;
/// Rising-humidity weights, applied per 10 % of increase.
const W_DU3H: f64 = 0.3;
const W_DU6H: f64 = 0.5;
/// Amplitude of the seasonal multiplier `1 + a·sin(doy)`.
const SEASONAL_AMPLITUDE: f64 = 0.1;

/// Fixed thresholds of the decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastThresholds {
    /// History considered, relative to the newest pressure sample.
    pub history_hours: f64,
    /// Fewer pressure samples than this in the history window → no nowcast.
    pub min_samples: usize,
    pub high_pressure_hpa: f64,
    pub low_pressure_hpa: f64,
    /// |Δp3h| at or beyond which the trend is "strong".
    pub strong_trend_hpa: f64,
    /// |Δp3h| at or beyond which the trend is not stable.
    pub trend_hpa: f64,
    pub storm_instability: f64,
    pub unsettled_instability: f64,
    /// Humidity above which rain is assumed when pressure is missing.
    pub humid_rain_pct: f64,
    pub ice_min_temp_c: f64,
    pub ice_max_temp_c: f64,
    pub ice_min_humidity_pct: f64,
    /// Rain/storm at or below this temperature turns into snow (or ice).
    pub snow_max_temp_c: f64,
}

impl Default for ForecastThresholds {
    fn default() -> Self {
        Self {
            history_hours: 24.0,
            min_samples: 3,
            high_pressure_hpa: 1020.0,
            low_pressure_hpa: 1002.0,
            strong_trend_hpa: 4.0,
            trend_hpa: 2.0,
            storm_instability: 6.0,
            unsettled_instability: 5.0,
            humid_rain_pct: 80.0,
            ice_min_temp_c: -3.0,
            ice_max_temp_c: 1.0,
            ice_min_humidity_pct: 80.0,
            snow_max_temp_c: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    High,
    Normal,
    Low,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PressureTrend {
    StrongDown,
    Down,
    Stable,
    Up,
    StrongUp,
    Unknown,
}

impl PressureLevel {
    fn as_str(self) -> &'static str {
        match self {
            PressureLevel::High => "high",
            PressureLevel::Normal => "normal",
            PressureLevel::Low => "low",
            PressureLevel::Unknown => "unknown",
        }
    }
}

impl PressureTrend {
    fn as_str(self) -> &'static str {
        match self {
            PressureTrend::StrongDown => "strong_down",
            PressureTrend::Down => "down",
            PressureTrend::Stable => "stable",
            PressureTrend::Up => "up",
            PressureTrend::StrongUp => "strong_up",
            PressureTrend::Unknown => "unknown",
        }
    }
}

/// Icon category handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ForecastIcon {
    Clear,
    Partly,
    Cloudy,
    Rain,
    Storm,
    Snow,
    Ice,
    Frost,
    Uncertain,
}

/// Inputs to the decision table. Built fresh per request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub pressure_now: Option<f64>,
    pub dp1h: Option<f64>,
    pub dp3h: Option<f64>,
    pub dp6h: Option<f64>,
    pub humidity_now: Option<f64>,
    pub temperature_now: Option<f64>,
    pub du3h: Option<f64>,
    pub du6h: Option<f64>,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub doy_sin: f64,
    pub doy_cos: f64,
    pub sample_count: usize,
}

/// Nowcast output.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastResult {
    pub icon: ForecastIcon,
    /// Short headline, e.g. "Worsening, rain likely"
    pub summary: String,
    /// One-line explanation with the numbers behind the decision
    pub detail: String,
    /// Outdoor temperature in [-3, 1] °C with humidity ≥ 80 %
    pub ice_risk: bool,
    pub trend: PressureTrend,
    pub pressure_level: PressureLevel,
    pub instability_index: f64,
}

// ---------------------------------------------------------------------------
// Feature extraction
// ---------------------------------------------------------------------------

/// Value of the newest finite sample, scanning backward.
pub fn last_known(series: &Series) -> Option<f64> {
    series
        .iter()
        .rev()
        .find(|s| s.value.is_finite())
        .map(|s| s.value)
}

/// `last − first` over the samples within `window_hours` of the series' own
/// final timestamp.
pub fn delta_over_window(series: &Series, window_hours: f64) -> Option<f64> {
    let end = series.last()?.timestamp;
    let cutoff = end - hours(window_hours);
    let mut in_window = series
        .iter()
        .filter(|s| s.timestamp >= cutoff && s.value.is_finite());
    let first = in_window.next()?.value;
    let last = in_window.last().map_or(first, |s| s.value);
    Some(last - first)
}

/// Build the feature vector, or `None` when the pressure history holds fewer
/// than `min_samples` points (insufficient data).
pub fn build_features(
    pressure: &Series,
    outdoor_humidity: &Series,
    outdoor_temperature: &Series,
    thresholds: &ForecastThresholds,
) -> Option<FeatureVector> {
    let end = pressure.last()?.timestamp;
    let recent = pressure.since(end - hours(thresholds.history_hours));
    if recent.len() < thresholds.min_samples {
        return None;
    }

    let hour_angle = 2.0 * PI * f64::from(end.hour()) / 24.0;
    let doy_angle = 2.0 * PI * f64::from(day_of_year(end)) / 365.0;

    Some(FeatureVector {
        pressure_now: last_known(&recent),
        dp1h: delta_over_window(&recent, 1.0),
        dp3h: delta_over_window(&recent, 3.0),
        dp6h: delta_over_window(&recent, 6.0),
        humidity_now: last_known(outdoor_humidity),
        temperature_now: last_known(outdoor_temperature),
        du3h: delta_over_window(outdoor_humidity, 3.0),
        du6h: delta_over_window(outdoor_humidity, 6.0),
        hour_sin: hour_angle.sin(),
        hour_cos: hour_angle.cos(),
        doy_sin: doy_angle.sin(),
        doy_cos: doy_angle.cos(),
        sample_count: recent.len(),
    })
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

pub fn classify_level(pressure_now: Option<f64>, t: &ForecastThresholds) -> PressureLevel {
    match pressure_now {
        None => PressureLevel::Unknown,
        Some(p) if p >= t.high_pressure_hpa => PressureLevel::High,
        Some(p) if p <= t.low_pressure_hpa => PressureLevel::Low,
        Some(_) => PressureLevel::Normal,
    }
}

/// Boundary values resolve to the stronger bucket (−4 → strong_down, 2 → up).
pub fn classify_trend(dp3h: Option<f64>, t: &ForecastThresholds) -> PressureTrend {
    match dp3h {
        None => PressureTrend::Unknown,
        Some(d) if d <= -t.strong_trend_hpa => PressureTrend::StrongDown,
        Some(d) if d <= -t.trend_hpa => PressureTrend::Down,
        Some(d) if d >= t.strong_trend_hpa => PressureTrend::StrongUp,
        Some(d) if d >= t.trend_hpa => PressureTrend::Up,
        Some(_) => PressureTrend::Stable,
    }
}

/// Composite volatility score. Missing terms contribute nothing, so a vector
/// with no deltas and no humidity scores exactly 0.
pub fn instability_index(f: &FeatureVector) -> f64 {
    let volatility: f64 = [(W_DP3H, f.dp3h), (W_DP6H, f.dp6h), (W_DP1H, f.dp1h)]
        .iter()
        .filter_map(|(w, d)| d.map(|d| w * d.abs()))
        .sum();

    let mut score = volatility;
    if let Some(u) = f.humidity_now {
        score += W_HUMIDITY * (u - HUMIDITY_BASELINE_PCT).max(0.0);
    }
    if let Some(du) = f.du3h.filter(|d| *d > 0.0) {
        score += W_DU3H * (du / 10.0);
    }
    if let Some(du) = f.du6h.filter(|d| *d > 0.0) {
        score += W_DU6H * (du / 10.0);
    }

    score * (1.0 + SEASONAL_AMPLITUDE * f.doy_sin)
}

/// Run the full decision table on a feature vector.
pub fn classify(f: &FeatureVector, t: &ForecastThresholds) -> ForecastResult {
    let level = classify_level(f.pressure_now, t);
    let trend = classify_trend(f.dp3h, t);
    let instability = instability_index(f);

    let (icon, summary) = primary_decision(f, level, trend, instability, t);
    let detail = describe(f, level, trend, instability);

    let ice_risk = match (f.temperature_now, f.humidity_now) {
        (Some(temp), Some(hum)) => {
            (t.ice_min_temp_c..=t.ice_max_temp_c).contains(&temp)
                && hum >= t.ice_min_humidity_pct
        }
        _ => false,
    };

    let cold = f.temperature_now.is_some_and(|temp| temp <= t.snow_max_temp_c);
    let (icon, summary) = match icon {
        ForecastIcon::Rain | ForecastIcon::Storm if cold && ice_risk => {
            (ForecastIcon::Ice, "Freezing precipitation, icy surfaces")
        }
        ForecastIcon::Rain | ForecastIcon::Storm if cold => (ForecastIcon::Snow, "Snow likely"),
        ForecastIcon::Clear | ForecastIcon::Partly | ForecastIcon::Cloudy if ice_risk => {
            (ForecastIcon::Frost, "Frost risk")
        }
        other => (other, summary),
    };

    ForecastResult {
        icon,
        summary: summary.to_string(),
        detail,
        ice_risk,
        trend,
        pressure_level: level,
        instability_index: instability,
    }
}

fn primary_decision(
    f: &FeatureVector,
    level: PressureLevel,
    trend: PressureTrend,
    instability: f64,
    t: &ForecastThresholds,
) -> (ForecastIcon, &'static str) {
    if f.pressure_now.is_none() {
        return match f.humidity_now {
            Some(h) if h > t.humid_rain_pct => (ForecastIcon::Rain, "Possible rain"),
            _ => (ForecastIcon::Uncertain, "Uncertain, missing pressure data"),
        };
    }

    match trend {
        PressureTrend::StrongUp | PressureTrend::Up => {
            if level == PressureLevel::High {
                (ForecastIcon::Clear, "Improving, clear skies")
            } else {
                (ForecastIcon::Partly, "Improving, partial clearing")
            }
        }
        PressureTrend::StrongDown | PressureTrend::Down => {
            if instability > t.storm_instability {
                (ForecastIcon::Storm, "Worsening, storm likely")
            } else {
                (ForecastIcon::Rain, "Worsening, rain likely")
            }
        }
        // A missing 3h delta with a known level reads like a flat tendency.
        PressureTrend::Stable | PressureTrend::Unknown => match level {
            PressureLevel::High => (ForecastIcon::Clear, "Settled, clear"),
            PressureLevel::Low if instability > t.unsettled_instability => {
                (ForecastIcon::Rain, "Scattered showers")
            }
            PressureLevel::Low => (ForecastIcon::Cloudy, "Overcast, variable"),
            _ if instability > t.unsettled_instability => {
                (ForecastIcon::Rain, "Moderately unstable, showers possible")
            }
            _ => (ForecastIcon::Partly, "Mostly stable"),
        },
    }
}

fn describe(
    f: &FeatureVector,
    level: PressureLevel,
    trend: PressureTrend,
    instability: f64,
) -> String {
    let mut parts = Vec::new();
    match f.pressure_now {
        Some(p) => parts.push(format!("Pressure {:.1} hPa ({})", p, level.as_str())),
        None => parts.push("no pressure data".to_string()),
    }
    if let Some(d) = f.dp3h {
        parts.push(format!("3h change {:+.1} hPa ({})", d, trend.as_str()));
    }
    if let Some(h) = f.humidity_now {
        parts.push(format!("outdoor humidity {:.0}%", h));
    }
    if let Some(temp) = f.temperature_now {
        parts.push(format!("outdoor {:.1} °C", temp));
    }
    parts.push(format!("instability {:.1}", instability));
    parts.join(", ")
}

/// Feature extraction plus classification straight from a cleaned set.
///
/// `None` means insufficient pressure history, a normal degraded state.
pub fn nowcast(telemetry: &TelemetrySet, t: &ForecastThresholds) -> Option<ForecastResult> {
    let pressure = telemetry.get(Metric::Pressure);
    let Some(features) = build_features(
        &pressure,
        &telemetry.get(Metric::OutdoorHumidity),
        &telemetry.get(Metric::OutdoorTemperature),
        t,
    ) else {
        tracing::debug!(
            "Nowcast skipped: {} pressure samples available, need {}",
            pressure.len(),
            t.min_samples
        );
        return None;
    };
    Some(classify(&features, t))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::series::Sample;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::BTreeMap;

    fn blank() -> FeatureVector {
        FeatureVector {
            pressure_now: None,
            dp1h: None,
            dp3h: None,
            dp6h: None,
            humidity_now: None,
            temperature_now: None,
            du3h: None,
            du6h: None,
            hour_sin: 0.0,
            hour_cos: 1.0,
            doy_sin: 0.0,
            doy_cos: 1.0,
            sample_count: 0,
        }
    }

    fn end() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    /// Hourly samples ending at `end()`, oldest first.
    fn hourly(values: &[f64]) -> Series {
        let n = values.len() as i64;
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(end() - Duration::hours(n - 1 - i as i64), *v))
            .collect()
    }

    #[test]
    fn test_trend_boundary_table() {
        let t = ForecastThresholds::default();
        let table = [
            (-5.0, PressureTrend::StrongDown),
            (-4.0, PressureTrend::StrongDown),
            (-3.0, PressureTrend::Down),
            (-2.0, PressureTrend::Down),
            (0.0, PressureTrend::Stable),
            (2.0, PressureTrend::Up),
            (3.0, PressureTrend::Up),
            (4.0, PressureTrend::StrongUp),
            (5.0, PressureTrend::StrongUp),
        ];
        for (dp, expected) in table {
            assert_eq!(classify_trend(Some(dp), &t), expected, "dp3h = {}", dp);
        }
        assert_eq!(classify_trend(None, &t), PressureTrend::Unknown);
    }

    #[test]
    fn test_level_boundaries() {
        let t = ForecastThresholds::default();
        assert_eq!(classify_level(Some(1020.0), &t), PressureLevel::High);
        assert_eq!(classify_level(Some(1019.9), &t), PressureLevel::Normal);
        assert_eq!(classify_level(Some(1002.0), &t), PressureLevel::Low);
        assert_eq!(classify_level(None, &t), PressureLevel::Unknown);
    }

    #[test]
    fn test_instability_zero_when_everything_missing() {
        let mut f = blank();
        f.doy_sin = 0.8;
        assert_eq!(instability_index(&f), 0.0);
    }

    #[test]
    fn test_instability_weights() {
        let mut f = blank();
        f.dp3h = Some(-4.0);
        f.dp6h = Some(2.0);
        f.dp1h = Some(-1.0);
        f.humidity_now = Some(90.0);
        f.du3h = Some(10.0);
        f.du6h = Some(-20.0);
        // 4 + 1 + 0.3 + 0.4 + 0.3, du6h ignored because it is falling
        assert!((instability_index(&f) - 6.0).abs() < 1e-9);

        f.doy_sin = 1.0;
        assert!((instability_index(&f) - 6.6).abs() < 1e-9);
    }

    #[test]
    fn test_last_known_and_delta() {
        let series = hourly(&[1010.0, 1011.0, 1012.0, 1014.0]);
        assert_eq!(last_known(&series), Some(1014.0));
        assert_eq!(delta_over_window(&series, 1.0), Some(2.0));
        assert_eq!(delta_over_window(&series, 3.0), Some(4.0));
        // Window wider than the data uses whatever is there.
        assert_eq!(delta_over_window(&series, 6.0), Some(4.0));
        assert_eq!(delta_over_window(&Series::default(), 3.0), None);
        assert_eq!(last_known(&Series::default()), None);
    }

    #[test]
    fn test_delta_single_sample_window_is_zero() {
        let series = hourly(&[1000.0, 1005.0]);
        assert_eq!(delta_over_window(&series, 0.5), Some(0.0));
    }

    #[test]
    fn test_build_features_insufficient_data() {
        let t = ForecastThresholds::default();
        let two = hourly(&[1013.0, 1013.5]);
        assert!(build_features(&two, &Series::default(), &Series::default(), &t).is_none());
        assert!(
            build_features(&Series::default(), &Series::default(), &Series::default(), &t)
                .is_none()
        );
    }

    #[test]
    fn test_build_features_ignores_history_older_than_24h() {
        let t = ForecastThresholds::default();
        // Two points 30h old plus two fresh ones: only 2 inside the window.
        let series: Series = vec![
            Sample::new(end() - Duration::hours(31), 990.0),
            Sample::new(end() - Duration::hours(30), 991.0),
            Sample::new(end() - Duration::hours(1), 1013.0),
            Sample::new(end(), 1013.2),
        ]
        .into_iter()
        .collect();
        assert!(build_features(&series, &Series::default(), &Series::default(), &t).is_none());
    }

    #[test]
    fn test_build_features_time_encoding() {
        let t = ForecastThresholds::default();
        let f = build_features(
            &hourly(&[1013.0, 1013.0, 1013.0]),
            &Series::default(),
            &Series::default(),
            &t,
        )
        .unwrap();
        // 12:00 UTC → half turn.
        assert!((f.hour_sin - 0.0).abs() < 1e-9);
        assert!((f.hour_cos + 1.0).abs() < 1e-9);
        // 1 March = day 60.
        let doy = 2.0 * PI * 60.0 / 365.0;
        assert!((f.doy_sin - doy.sin()).abs() < 1e-12);
        assert_eq!(f.sample_count, 3);
    }

    #[test]
    fn test_high_and_rising_is_clear() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1022.0);
        f.dp3h = Some(5.0);
        let result = classify(&f, &t);
        assert_eq!(result.pressure_level, PressureLevel::High);
        assert_eq!(result.trend, PressureTrend::StrongUp);
        assert_eq!(result.icon, ForecastIcon::Clear);
        assert!(result.summary.contains("Improving"));
    }

    #[test]
    fn test_end_to_end_rising_series_is_clear() {
        let t = ForecastThresholds::default();
        let pressure = hourly(&[1016.0, 1016.5, 1017.0, 1019.0, 1020.5, 1022.0]);
        let f = build_features(&pressure, &Series::default(), &Series::default(), &t).unwrap();
        assert_eq!(f.dp3h, Some(5.0));
        let result = classify(&f, &t);
        assert_eq!(result.icon, ForecastIcon::Clear);
        assert!(!result.ice_risk);
    }

    #[test]
    fn test_rising_from_normal_is_partial_clearing() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1010.0);
        f.dp3h = Some(2.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Partly);
    }

    #[test]
    fn test_falling_rain_vs_storm() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1005.0);
        f.dp3h = Some(-3.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Rain);

        f.dp3h = Some(-5.0);
        f.dp6h = Some(-6.0);
        // 5 + 3 = 8 > 6
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Storm);
    }

    #[test]
    fn test_stable_branches() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.dp3h = Some(0.5);

        f.pressure_now = Some(1025.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Clear);

        f.pressure_now = Some(998.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Cloudy);
        f.humidity_now = Some(100.0);
        f.du3h = Some(20.0);
        f.du6h = Some(40.0);
        // 0.5 + 0.6 + 0.6 + 2.0 = 3.7, still below 5
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Cloudy);
        f.dp6h = Some(3.0);
        // + 1.5 = 5.2
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Rain);

        f.pressure_now = Some(1012.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Rain);
        f.dp6h = None;
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Partly);
    }

    #[test]
    fn test_missing_pressure_falls_back_to_humidity() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Uncertain);
        f.humidity_now = Some(85.0);
        let result = classify(&f, &t);
        assert_eq!(result.icon, ForecastIcon::Rain);
        assert_eq!(result.pressure_level, PressureLevel::Unknown);
        f.humidity_now = Some(80.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Uncertain);
    }

    #[test]
    fn test_override_rain_to_ice() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1005.0);
        f.dp3h = Some(-3.0);
        f.temperature_now = Some(0.0);
        f.humidity_now = Some(85.0);
        let result = classify(&f, &t);
        assert_eq!(result.icon, ForecastIcon::Ice);
        assert!(result.ice_risk);
    }

    #[test]
    fn test_override_rain_to_snow_when_too_cold_for_ice() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1005.0);
        f.dp3h = Some(-3.0);
        f.temperature_now = Some(-8.0);
        f.humidity_now = Some(90.0);
        let result = classify(&f, &t);
        assert_eq!(result.icon, ForecastIcon::Snow);
        assert!(!result.ice_risk);
    }

    #[test]
    fn test_override_clear_to_frost() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1025.0);
        f.dp3h = Some(0.0);
        f.temperature_now = Some(-1.0);
        f.humidity_now = Some(92.0);
        let result = classify(&f, &t);
        assert_eq!(result.icon, ForecastIcon::Frost);
        assert!(result.ice_risk);
    }

    #[test]
    fn test_override_leaves_warm_rain_alone() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1005.0);
        f.dp3h = Some(-3.0);
        f.temperature_now = Some(1.5);
        f.humidity_now = Some(95.0);
        assert_eq!(classify(&f, &t).icon, ForecastIcon::Rain);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let t = ForecastThresholds::default();
        let mut f = blank();
        f.pressure_now = Some(1008.0);
        f.dp3h = Some(-2.5);
        f.humidity_now = Some(77.0);
        assert_eq!(classify(&f, &t), classify(&f, &t));
    }

    #[test]
    fn test_nowcast_from_telemetry_set() {
        let t = ForecastThresholds::default();
        let set = TelemetrySet::new(BTreeMap::from([
            (
                Metric::Pressure,
                hourly(&[1012.0, 1011.0, 1010.0, 1008.0, 1006.5, 1005.0]),
            ),
            (Metric::OutdoorTemperature, hourly(&[1.0, 0.5, 0.0])),
            (Metric::OutdoorHumidity, hourly(&[82.0, 84.0, 85.0])),
        ]));
        let result = nowcast(&set, &t).unwrap();
        assert_eq!(result.trend, PressureTrend::StrongDown);
        assert_eq!(result.icon, ForecastIcon::Ice);

        assert!(nowcast(&TelemetrySet::default(), &t).is_none());
    }
}
