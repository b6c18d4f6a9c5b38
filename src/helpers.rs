//! Shared time helpers.
//!
//! ThingSpeak stamps feed entries as RFC 3339 (`2026-03-01T07:00:00Z`), and a
//! few channels configured with a local timezone emit an explicit offset
//! (`2026-03-01T08:00:00+01:00`). Both normalise to UTC here.

use chrono::{DateTime, Datelike, Duration, Utc};

/// Parse a feed timestamp into UTC, or `None` if it is not RFC 3339.
pub(crate) fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a (possibly fractional) number of hours into a `chrono::Duration`.
pub(crate) fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0).round() as i64)
}

/// 1-indexed day of the year (1 January = 1). No leap-year correction is
/// applied by callers that scale it over 365 days.
pub(crate) fn day_of_year(t: DateTime<Utc>) -> u32 {
    t.ordinal()
}
