//! ThingSpeak channel feed client.
//!
//! Fetches the most recent N entries of a channel.
//! See: https://www.mathworks.com/help/thingspeak/readdata.html
//!
//! The feed is a recency window, not pagination: a large display horizon
//! requested with too small an N is silently truncated, and callers treat the
//! result as possibly incomplete.

use std::collections::{BTreeMap, HashMap};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

use crate::config::FieldSchema;
use crate::errors::AppError;
use crate::services::series::RawValue;
use crate::services::telemetry::RawRow;

/// Hard cap ThingSpeak applies to `results`.
pub const MAX_RESULTS: u32 = 8000;

/// Anything that can hand back the most recent `results` feed rows.
pub trait TelemetrySource: Send + Sync {
    fn fetch_recent(&self, results: u32) -> BoxFuture<'_, Result<Vec<RawRow>, AppError>>;
}

/// Client for one ThingSpeak channel.
#[derive(Debug, Clone)]
pub struct ThingSpeakClient {
    client: reqwest::Client,
    base_url: String,
    channel_id: u64,
    api_key: Option<String>,
    schema: FieldSchema,
}

// --- ThingSpeak JSON response types ---

#[derive(Debug, Deserialize)]
struct FeedResponse {
    feeds: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    created_at: String,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

impl ThingSpeakClient {
    pub fn new(
        base_url: &str,
        channel_id: u64,
        api_key: Option<String>,
        schema: FieldSchema,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("barometer-nowcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            channel_id,
            api_key,
            schema,
        })
    }

    /// Fetch the newest `results` entries (clamped to `MAX_RESULTS`).
    pub async fn fetch_feed(&self, results: u32) -> Result<Vec<RawRow>, AppError> {
        let url = format!("{}/channels/{}/feeds.json", self.base_url, self.channel_id);
        let results = results.clamp(1, MAX_RESULTS).to_string();

        let mut query = vec![("results", results.as_str())];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("api_key", key));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("ThingSpeak request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "ThingSpeak returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Fetch(format!("ThingSpeak body read failed: {}", e)))?;

        let rows = parse_feed(&body, &self.schema)?;
        tracing::debug!(
            "ThingSpeak channel {}: requested {} rows, received {}",
            self.channel_id,
            results,
            rows.len()
        );
        Ok(rows)
    }
}

impl TelemetrySource for ThingSpeakClient {
    fn fetch_recent(&self, results: u32) -> BoxFuture<'_, Result<Vec<RawRow>, AppError>> {
        self.fetch_feed(results).boxed()
    }
}

/// Parse a feeds.json body into schema-mapped rows.
///
/// A body that is not JSON, lacks `feeds`, or has an entry without
/// `created_at` is structural. Null or absent fields just yield no reading.
pub fn parse_feed(body: &str, schema: &FieldSchema) -> Result<Vec<RawRow>, AppError> {
    let response: FeedResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Structural(format!("ThingSpeak feed structure error: {}", e)))?;

    let field_names: Vec<_> = schema
        .metrics()
        .filter_map(|m| schema.field_name(m).map(|name| (m, name)))
        .collect();

    Ok(response
        .feeds
        .into_iter()
        .map(|entry| {
            let readings: BTreeMap<_, _> = field_names
                .iter()
                .filter_map(|(metric, name)| {
                    raw_value(entry.fields.get(name)?).map(|v| (*metric, v))
                })
                .collect();
            RawRow {
                created_at: entry.created_at,
                readings,
            }
        })
        .collect())
}

fn raw_value(value: &serde_json::Value) -> Option<RawValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
        serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number),
        other => Some(RawValue::Text(other.to_string())),
    }
}
