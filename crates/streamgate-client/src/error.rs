//! Error types for streaming-service client operations.
//!
//! Errors are categorized by where they occur (cursor creation, message
//! fetch, transport) so callers can decide between retrying, backing off,
//! or treating the cycle as failed.
//!
//! ## Error Handling Strategy
//!
//! - **Retriable errors**: `Throttled`, `Transport`, `Service` with a 5xx status
//! - **Cycle-fatal errors**: `CursorCreation` (retried on the next cycle)
//! - **Client errors**: `Config`, `InvalidResponse`

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the streaming service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Cursor creation was rejected or could not be completed.
    ///
    /// The (stream, group, instance) triple may be invalid or the service
    /// unreachable. Fatal for the current cycle only; the consume loop
    /// retries creation on its next cycle.
    #[error("Cursor creation failed: {0}")]
    CursorCreation(String),

    /// The fetch endpoint rejected the request with HTTP 429.
    ///
    /// The fetch API is a throttled method; callers should back off at
    /// least their pacing interval before retrying with the same cursor.
    #[error("Request throttled by the service")]
    Throttled,

    /// The service returned a non-success status other than throttling.
    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// The request never produced an HTTP response (DNS, connect,
    /// timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be interpreted (missing
    /// next-cursor header, malformed JSON body).
    #[error("Invalid response from service: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration (empty endpoint, bad URL).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}
