//! Time facet

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Wall clock and timestamp formatting
pub trait Time: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;

    /// Parse an RFC 3339 date into milliseconds, `None` if unparsable
    fn timestamp(&self, iso: &str) -> Option<i64>;

    /// Format milliseconds as an RFC 3339 UTC date
    fn iso_date(&self, ms: i64) -> String;
}

/// System clock backed by `chrono`
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Time for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn timestamp(&self, iso: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(iso)
            .ok()
            .map(|d| d.timestamp_millis())
    }

    fn iso_date(&self, ms: i64) -> String {
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }
}
