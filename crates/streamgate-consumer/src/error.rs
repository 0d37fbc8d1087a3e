//! Error types for the consumer daemon.
//!
//! The consume loop itself recovers from every runtime failure locally
//! (see the worker module), so these errors surface only from
//! construction paths: configuration loading and sink setup.

use thiserror::Error;

/// Errors raised while constructing or configuring the daemon.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The streaming-service client could not be constructed.
    #[error("Client error: {0}")]
    Client(#[from] streamgate_client::ClientError),

    /// A sink rejected a delivery.
    #[error("Sink error: {0}")]
    Sink(String),
}

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;
