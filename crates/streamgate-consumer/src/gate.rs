//! Gate check against the object-storage flag authority.
//!
//! Consumption is enabled or disabled by an externally-owned flag object
//! in an object-storage bucket. The gate is sampled once per loop cycle
//! and never cached beyond that cycle; the authority owns the state.
//!
//! ## Flag semantics
//!
//! The flag is existence-of-object. In normal operation the check reads
//! the primary object; in DR (failover) mode it reads the reverse
//! object, the alternate location kept in the failover region:
//!
//! - HTTP 200: flag present, consumption enabled
//! - HTTP 404: flag absent, consumption disabled
//! - anything else: treated as disabled for this cycle (pausing and
//!   rewinding is the safe side of an unknown authority) and reported
//!   with a `warn!` event
//!
//! The check never blocks indefinitely; the HTTP client carries a
//! request timeout.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::error::{ConsumerError, Result};

/// Default bucket when the configured name is empty.
const DEFAULT_BUCKET: &str = "data";
/// Default primary flag object.
const DEFAULT_OBJECT: &str = "r1";
/// Default reverse (DR) flag object.
const DEFAULT_OBJECT_REVERSE: &str = "r2";

/// Per-request timeout for gate lookups.
const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// The externally-controlled boolean that enables or disables consumption.
///
/// Implementations must not propagate lookup failures to the loop: any
/// error deterministically reads as "disabled this cycle".
#[async_trait]
pub trait GateChecker: Send + Sync {
    async fn is_enabled(&self) -> bool;
}

/// Identifies the flag object and its DR counterpart.
///
/// Empty strings mean "use the default location".
#[derive(Debug, Clone)]
pub struct GateTarget {
    pub namespace: String,
    pub bucket: String,
    pub object_name: String,
    pub object_reverse_name: String,
    pub is_dr: bool,
}

impl GateTarget {
    /// The bucket to read, applying the default for an empty name.
    fn effective_bucket(&self) -> &str {
        if self.bucket.is_empty() {
            DEFAULT_BUCKET
        } else {
            &self.bucket
        }
    }

    /// The object the current mode reads: the primary flag normally, the
    /// reverse flag in DR mode.
    fn effective_object(&self) -> &str {
        if self.is_dr {
            if self.object_reverse_name.is_empty() {
                DEFAULT_OBJECT_REVERSE
            } else {
                &self.object_reverse_name
            }
        } else if self.object_name.is_empty() {
            DEFAULT_OBJECT
        } else {
            &self.object_name
        }
    }

    /// Object path under the storage endpoint:
    /// `/n/{namespace}/b/{bucket}/o/{object}`.
    pub fn object_path(&self) -> String {
        format!(
            "/n/{}/b/{}/o/{}",
            self.namespace,
            self.effective_bucket(),
            self.effective_object()
        )
    }
}

/// Gate backed by an object-storage flag object.
pub struct ObjectStorageGate {
    endpoint: String,
    target: GateTarget,
    http: reqwest::Client,
}

impl ObjectStorageGate {
    /// Create a gate reading flags under `endpoint`.
    pub fn new(endpoint: impl Into<String>, target: GateTarget) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ConsumerError::Config(
                "gate endpoint must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(GATE_TIMEOUT)
            .build()
            .map_err(|e| ConsumerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            target,
            http,
        })
    }

    fn flag_url(&self) -> String {
        format!("{}{}", self.endpoint, self.target.object_path())
    }
}

#[async_trait]
impl GateChecker for ObjectStorageGate {
    async fn is_enabled(&self) -> bool {
        let url = self.flag_url();
        match self.http.head(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    true
                } else if status == reqwest::StatusCode::NOT_FOUND {
                    false
                } else {
                    warn!(
                        url = %url,
                        status = status.as_u16(),
                        "unexpected gate response, treating as disabled"
                    );
                    false
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "gate lookup failed, treating as disabled");
                false
            }
        }
    }
}

/// Gate with a fixed answer.
///
/// Used when no gate authority is deployed (consumption always on) and
/// as a building block in tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate(pub bool);

#[async_trait]
impl GateChecker for StaticGate {
    async fn is_enabled(&self) -> bool {
        self.0
    }
}
