//! Delivery sink for decoded messages.
//!
//! The consume loop hands each decoded message to a [`Sink`], one call
//! per message, in the order the fetch returned them. Sinks are the
//! pluggable end of the pipeline: print, forward, dispatch.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// A message after base64 decoding, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// Decoded UTF-8 payload.
    pub text: String,
    /// Offset within the partition.
    pub offset: i64,
    /// Partition the message was read from.
    pub partition: String,
}

/// Receives decoded messages, one call per message, in batch order.
#[async_trait]
pub trait Sink: Send {
    async fn deliver(&mut self, message: &DeliveredMessage) -> Result<()>;
}

/// Sink that prints each message to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn deliver(&mut self, message: &DeliveredMessage) -> Result<()> {
        println!("[MESSAGE] {}", message.text);
        info!(
            offset = message.offset,
            partition = %message.partition,
            "message delivered"
        );
        Ok(())
    }
}
