//! Clock abstraction and rewind-timestamp computation.
//!
//! The consume loop records a rewind timestamp ("now minus a fixed
//! lookback window") every time it may restart consumption. Time is read
//! through the [`Clock`] trait so tests can drive the loop with a
//! deterministic clock instead of wall-clock waits.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Format expected by the cursor API: UTC, second precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used by the daemon.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Compute the rewind timestamp: `now − lookback`, formatted
/// `YYYY-MM-DDTHH:MM:SSZ` (UTC, truncated to whole seconds).
///
/// The lookback window is a policy parameter taken from configuration.
pub fn rewind_timestamp(now: DateTime<Utc>, lookback: Duration) -> String {
    let lookback = ChronoDuration::from_std(lookback).unwrap_or_else(|_| ChronoDuration::zero());
    (now - lookback).format(TIMESTAMP_FORMAT).to_string()
}
