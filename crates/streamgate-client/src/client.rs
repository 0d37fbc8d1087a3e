//! HTTP client for the streaming service.
//!
//! Covers the two consumed endpoints of the message plane:
//!
//! - `POST /20180418/streams/{stream_id}/groupCursors` creates a
//!   consumer-group cursor (trim horizon or at-time).
//! - `GET /20180418/streams/{stream_id}/messages` fetches a bounded batch
//!   with a held cursor; the token for the following fetch arrives in the
//!   `opc-next-cursor` response header.
//!
//! Streams are assigned a specific message endpoint when provisioned, so
//! the endpoint URL is part of the client configuration, not discovered
//! here. The [`StreamApi`] trait abstracts both calls so the consume loop
//! can be driven against an in-memory implementation in tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::cursor::{CreateCursorResponse, Cursor, GroupCursorDetails};
use crate::error::{ClientError, Result};
use crate::messages::{Message, MessageBatch};

/// Response header carrying the cursor for the next fetch.
const NEXT_CURSOR_HEADER: &str = "opc-next-cursor";

/// Default per-request timeout. The fetch call may block on network I/O
/// up to this long; it is the only blocking point besides pacing.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The streaming-service operations the consume loop depends on.
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Create a consumer-group cursor for this client's stream.
    async fn create_group_cursor(&self, details: &GroupCursorDetails) -> Result<Cursor>;

    /// Fetch at most `limit` messages with the held cursor.
    async fn get_messages(&self, cursor: &Cursor, limit: u32) -> Result<MessageBatch>;
}

/// REST client bound to one stream on one message endpoint.
pub struct StreamClient {
    endpoint: String,
    stream_id: String,
    http: reqwest::Client,
}

impl StreamClient {
    /// Create a client for `stream_id` served at `endpoint`.
    pub fn new(endpoint: impl Into<String>, stream_id: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let stream_id = stream_id.into();

        if endpoint.is_empty() {
            return Err(ClientError::Config("endpoint must not be empty".to_string()));
        }
        if stream_id.is_empty() {
            return Err(ClientError::Config("stream id must not be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            stream_id,
            http,
        })
    }

    /// The stream this client is bound to.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn cursors_url(&self) -> String {
        format!(
            "{}/20180418/streams/{}/groupCursors",
            self.endpoint, self.stream_id
        )
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/20180418/streams/{}/messages",
            self.endpoint, self.stream_id
        )
    }
}

#[async_trait]
impl StreamApi for StreamClient {
    async fn create_group_cursor(&self, details: &GroupCursorDetails) -> Result<Cursor> {
        let response = self
            .http
            .post(self.cursors_url())
            .json(details)
            .send()
            .await
            .map_err(|e| ClientError::CursorCreation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::CursorCreation(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let created: CreateCursorResponse = response
            .json()
            .await
            .map_err(|e| ClientError::CursorCreation(format!("malformed response: {}", e)))?;

        debug!(
            group = %details.group_name,
            instance = %details.instance_name,
            "group cursor created"
        );
        Ok(Cursor(created.value))
    }

    async fn get_messages(&self, cursor: &Cursor, limit: u32) -> Result<MessageBatch> {
        let response = self
            .http
            .get(self.messages_url())
            .query(&[
                ("cursor", cursor.as_str().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::Throttled);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Service {
                status: status.as_u16(),
                message: body,
            });
        }

        let next_cursor = response
            .headers()
            .get(NEXT_CURSOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| Cursor(v.to_string()))
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!("missing {} header", NEXT_CURSOR_HEADER))
            })?;

        let messages: Vec<Message> = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("malformed body: {}", e)))?;

        Ok(MessageBatch {
            messages,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Construction and validation
    // ---------------------------------------------------------------

    #[test]
    fn test_new_client() {
        let client = StreamClient::new("https://streams.example.com", "stream-1").unwrap();
        assert_eq!(client.stream_id(), "stream-1");
    }

    #[test]
    fn test_new_client_strips_trailing_slash() {
        let client = StreamClient::new("https://streams.example.com/", "s").unwrap();
        assert_eq!(
            client.messages_url(),
            "https://streams.example.com/20180418/streams/s/messages"
        );
    }

    #[test]
    fn test_new_client_empty_endpoint_rejected() {
        let result = StreamClient::new("", "s");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_new_client_empty_stream_rejected() {
        let result = StreamClient::new("https://streams.example.com", "");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    // ---------------------------------------------------------------
    // URL construction
    // ---------------------------------------------------------------

    #[test]
    fn test_cursors_url() {
        let client = StreamClient::new("https://host", "ocid1.stream.oc1..abc").unwrap();
        assert_eq!(
            client.cursors_url(),
            "https://host/20180418/streams/ocid1.stream.oc1..abc/groupCursors"
        );
    }

    #[test]
    fn test_messages_url() {
        let client = StreamClient::new("https://host", "s1").unwrap();
        assert_eq!(client.messages_url(), "https://host/20180418/streams/s1/messages");
    }

    // ---------------------------------------------------------------
    // Trait object safety
    // ---------------------------------------------------------------

    #[test]
    fn test_stream_api_object_safety() {
        let client = StreamClient::new("https://host", "s1").unwrap();
        let _: &dyn StreamApi = &client;
    }
}
