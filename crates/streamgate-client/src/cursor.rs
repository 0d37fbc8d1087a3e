//! Consumer-group cursor types.
//!
//! A cursor is an opaque, server-issued token scoped to a
//! (stream, consumer group, consumer instance) triple. It is created once
//! per open interval and then replaced by the `next-cursor` token of each
//! fetch response; the service tracks the group's position, so no local
//! offset state survives a restart.

use serde::{Deserialize, Serialize};

/// Opaque server-issued cursor token.
///
/// The token's contents are meaningful only to the service. At most one
/// cursor per (group, instance) is in use by a worker at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

impl Cursor {
    /// Borrow the raw token for inclusion in a request.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a freshly created group cursor starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorKind {
    /// Start from the oldest message still retained in the log.
    TrimHorizon,
    /// Start from a specific instant.
    AtTime,
}

/// Request body for creating a consumer-group cursor.
///
/// `commit_on_get` is always set: fetching with the resulting cursor
/// implicitly commits the group's progress, so there is no separate
/// commit call and delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCursorDetails {
    pub group_name: String,
    pub instance_name: String,
    #[serde(rename = "type")]
    pub kind: CursorKind,
    /// Start instant, ISO-8601 UTC. Present only for [`CursorKind::AtTime`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub commit_on_get: bool,
}

impl GroupCursorDetails {
    /// Cursor positioned at the trim horizon (oldest retained message).
    pub fn trim_horizon(group_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            instance_name: instance_name.into(),
            kind: CursorKind::TrimHorizon,
            time: None,
            commit_on_get: true,
        }
    }

    /// Cursor positioned at a specific instant (`YYYY-MM-DDTHH:MM:SSZ`).
    pub fn at_time(
        group_name: impl Into<String>,
        instance_name: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            instance_name: instance_name.into(),
            kind: CursorKind::AtTime,
            time: Some(time.into()),
            commit_on_get: true,
        }
    }
}

/// Response body returned by the cursor-creation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCursorResponse {
    pub value: String,
}
