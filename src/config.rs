use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::AppError;
use crate::services::forecast::ForecastThresholds;
use crate::services::series::ValueRange;
use crate::services::telemetry::Metric;

const DEFAULT_THINGSPEAK_URL: &str = "https://api.thingspeak.com";

/// ThingSpeak channels expose at most eight fields.
const MAX_FIELD_INDEX: u8 = 8;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub thingspeak_base_url: String,
    pub channel_id: u64,
    /// Read key; public channels need none.
    pub api_key: Option<String>,
    pub port: u16,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub log_format: LogFormat,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let channel_id = std::env::var("THINGSPEAK_CHANNEL_ID")
            .map_err(|_| AppError::Config("THINGSPEAK_CHANNEL_ID must be set".to_string()))?
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("THINGSPEAK_CHANNEL_ID: {}", e)))?;

        let mut pipeline = PipelineConfig::default();
        if let Ok(raw) = std::env::var("TELEMETRY_FIELDS") {
            pipeline.fields = FieldSchema::parse(&raw)?;
        }

        Ok(Self {
            thingspeak_base_url: std::env::var("THINGSPEAK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_THINGSPEAK_URL.to_string()),
            channel_id,
            api_key: std::env::var("THINGSPEAK_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            port: env_parse("PORT", 8080)?,
            refresh_interval: Duration::from_secs(env_parse("REFRESH_INTERVAL_SECS", 300)?),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 20)?),
            log_format: match std::env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            pipeline,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} must be valid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Which ThingSpeak `fieldN` carries which metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: BTreeMap<Metric, u8>,
}

impl FieldSchema {
    /// Build a schema, rejecting out-of-range or reused field indices.
    pub fn new(fields: BTreeMap<Metric, u8>) -> Result<Self, AppError> {
        let mut seen = [false; MAX_FIELD_INDEX as usize + 1];
        for (metric, &idx) in &fields {
            if idx == 0 || idx > MAX_FIELD_INDEX {
                return Err(AppError::Config(format!(
                    "{} mapped to field{}; expected 1..={}",
                    metric, idx, MAX_FIELD_INDEX
                )));
            }
            if std::mem::replace(&mut seen[idx as usize], true) {
                return Err(AppError::Config(format!("field{} mapped twice", idx)));
            }
        }
        Ok(Self { fields })
    }

    /// Parse `metric=index` pairs, e.g. `pressure=3,outdoor_humidity=5`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut fields = BTreeMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, idx) = pair
                .split_once('=')
                .ok_or_else(|| AppError::Config(format!("TELEMETRY_FIELDS entry '{}'", pair)))?;
            let metric: Metric = name
                .parse()
                .map_err(|_| AppError::Config(format!("unknown metric '{}'", name.trim())))?;
            let idx: u8 = idx
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("field index for {}: {}", metric, e)))?;
            fields.insert(metric, idx);
        }
        Self::new(fields)
    }

    /// Feed key for a metric, e.g. `"field3"`.
    pub fn field_name(&self, metric: Metric) -> Option<String> {
        self.fields.get(&metric).map(|idx| format!("field{}", idx))
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.fields.keys().copied()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            fields: BTreeMap::from([
                (Metric::IndoorTemperature, 1),
                (Metric::IndoorHumidity, 2),
                (Metric::Pressure, 3),
                (Metric::OutdoorTemperature, 4),
                (Metric::OutdoorHumidity, 5),
            ]),
        }
    }
}

/// Validity interval and maximum per-sample step for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricLimits {
    pub range: ValueRange,
    pub max_step: f64,
}

impl MetricLimits {
    pub fn default_for(metric: Metric) -> Self {
        let (min, max, max_step) = match metric {
            Metric::Pressure => (870.0, 1085.0, 4.0),
            Metric::IndoorTemperature => (-10.0, 50.0, 5.0),
            Metric::OutdoorTemperature => (-50.0, 60.0, 5.0),
            Metric::IndoorHumidity | Metric::OutdoorHumidity => (0.0, 100.0, 15.0),
        };
        Self {
            range: ValueRange::new(min, max),
            max_step,
        }
    }
}

/// Everything the cleaning and nowcast stages are parameterised by.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fields: FieldSchema,
    pub limits: BTreeMap<Metric, MetricLimits>,
    pub forecast: ForecastThresholds,
}

impl PipelineConfig {
    pub fn limits_for(&self, metric: Metric) -> MetricLimits {
        self.limits
            .get(&metric)
            .copied()
            .unwrap_or_else(|| MetricLimits::default_for(metric))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: FieldSchema::default(),
            limits: Metric::ALL
                .into_iter()
                .map(|m| (m, MetricLimits::default_for(m)))
                .collect(),
            forecast: ForecastThresholds::default(),
        }
    }
}
