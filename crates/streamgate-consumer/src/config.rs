//! Daemon configuration.
//!
//! All settings come from environment variables read once at startup;
//! the resulting [`ConsumerConfig`] is immutable and shared by reference
//! with every partition worker.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STREAMGATE_ENDPOINT` | Message endpoint URL | required |
//! | `STREAMGATE_STREAM_ID` | Stream identifier | required |
//! | `STREAMGATE_GROUP` | Consumer group name | `example-group` |
//! | `STREAMGATE_INSTANCE` | Consumer instance base name | `example-instance` |
//! | `STREAMGATE_PARTITIONS` | Number of partition workers | `1` |
//! | `STREAMGATE_RETURN_LIMIT` | Max messages per fetch | `10000` |
//! | `STREAMGATE_POLL_INTERVAL_MS` | Pacing between fetches | `1000` |
//! | `STREAMGATE_REWIND_SECS` | Rewind lookback window | `300` |
//! | `STREAMGATE_GATE_ENDPOINT` | Object-storage endpoint for the gate | (none: gate always open) |
//! | `STREAMGATE_GATE_NAMESPACE` | Gate flag namespace | (empty) |
//! | `STREAMGATE_GATE_BUCKET` | Gate flag bucket | `data` |
//! | `STREAMGATE_GATE_OBJECT` | Primary flag object | `r1` |
//! | `STREAMGATE_GATE_OBJECT_REVERSE` | Reverse (DR) flag object | `r2` |
//! | `STREAMGATE_GATE_DR` | Read the DR flag location | `false` |

use std::time::Duration;

use crate::error::{ConsumerError, Result};
use crate::gate::GateTarget;

/// Default consumer group name.
const DEFAULT_GROUP: &str = "example-group";
/// Default consumer instance base name; workers append `-{partition}`.
const DEFAULT_INSTANCE: &str = "example-instance";
/// Default fetch batch-size limit.
const DEFAULT_RETURN_LIMIT: u32 = 10_000;
/// Default pacing interval between fetches. The fetch endpoint is a
/// throttled method; clients should retrieve sufficiently large batches
/// rather than issue many small requests.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Default rewind lookback window.
const DEFAULT_REWIND_SECS: u64 = 300;

/// Gate authority settings.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Object-storage endpoint. Absent means no gate authority is
    /// deployed and consumption is always enabled.
    pub endpoint: Option<String>,
    pub namespace: String,
    pub bucket: String,
    pub object_name: String,
    pub object_reverse_name: String,
    pub is_dr: bool,
}

impl GateConfig {
    /// The flag target this configuration describes.
    pub fn target(&self) -> GateTarget {
        GateTarget {
            namespace: self.namespace.clone(),
            bucket: self.bucket.clone(),
            object_name: self.object_name.clone(),
            object_reverse_name: self.object_reverse_name.clone(),
            is_dr: self.is_dr,
        }
    }
}

/// Immutable daemon configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Message endpoint URL assigned to the stream.
    pub endpoint: String,
    /// Stream identifier.
    pub stream_id: String,
    /// Consumer group name.
    pub group_name: String,
    /// Consumer instance base name; worker `p` registers as
    /// `"{instance}-{p}"` so each partition owns its tracked position.
    pub instance_name: String,
    /// Number of independent partition workers.
    pub partitions: u32,
    /// Fetch batch-size limit.
    pub return_limit: u32,
    /// Pacing interval between fetches.
    pub poll_interval: Duration,
    /// Rewind lookback window.
    pub rewind_window: Duration,
    /// Gate authority settings.
    pub gate: GateConfig,
}

impl ConsumerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a lookup function.
    ///
    /// Factored out of [`from_env`] so tests can supply variables
    /// without mutating process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("STREAMGATE_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConsumerError::Config("STREAMGATE_ENDPOINT is required".to_string()))?;

        let stream_id = lookup("STREAMGATE_STREAM_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConsumerError::Config("STREAMGATE_STREAM_ID is required".to_string()))?;

        let group_name = lookup("STREAMGATE_GROUP").unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let instance_name =
            lookup("STREAMGATE_INSTANCE").unwrap_or_else(|| DEFAULT_INSTANCE.to_string());

        let partitions = parse_or(&lookup, "STREAMGATE_PARTITIONS", 1u32)?;
        if partitions == 0 {
            return Err(ConsumerError::Config(
                "STREAMGATE_PARTITIONS must be at least 1".to_string(),
            ));
        }

        let return_limit = parse_or(&lookup, "STREAMGATE_RETURN_LIMIT", DEFAULT_RETURN_LIMIT)?;
        if return_limit == 0 {
            return Err(ConsumerError::Config(
                "STREAMGATE_RETURN_LIMIT must be at least 1".to_string(),
            ));
        }

        let poll_interval_ms =
            parse_or(&lookup, "STREAMGATE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let rewind_secs = parse_or(&lookup, "STREAMGATE_REWIND_SECS", DEFAULT_REWIND_SECS)?;

        let gate = GateConfig {
            endpoint: lookup("STREAMGATE_GATE_ENDPOINT").filter(|v| !v.trim().is_empty()),
            namespace: lookup("STREAMGATE_GATE_NAMESPACE").unwrap_or_default(),
            bucket: lookup("STREAMGATE_GATE_BUCKET").unwrap_or_default(),
            object_name: lookup("STREAMGATE_GATE_OBJECT").unwrap_or_default(),
            object_reverse_name: lookup("STREAMGATE_GATE_OBJECT_REVERSE").unwrap_or_default(),
            is_dr: parse_or(&lookup, "STREAMGATE_GATE_DR", false)?,
        };

        Ok(Self {
            endpoint,
            stream_id,
            group_name,
            instance_name,
            partitions,
            return_limit,
            poll_interval: Duration::from_millis(poll_interval_ms),
            rewind_window: Duration::from_secs(rewind_secs),
            gate,
        })
    }

    /// Instance name registered by the worker for `partition`.
    pub fn instance_for_partition(&self, partition: u32) -> String {
        format!("{}-{}", self.instance_name, partition)
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConsumerError::Config(format!("invalid {}: {}", key, e))),
        None => Ok(default),
    }
}
