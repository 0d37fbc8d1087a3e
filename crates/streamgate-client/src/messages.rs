//! Wire types for fetched messages.
//!
//! Message keys and values travel base64-encoded over the wire and are
//! decoded to raw bytes here. A decode failure on a single message is
//! reported as a [`DecodeError`] and never aborts the rest of a batch;
//! the consume loop decides whether to skip or dead-letter.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::cursor::Cursor;

/// A single-message decode failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The wire value was not valid base64.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes were not valid UTF-8.
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A message as returned by the fetch endpoint.
///
/// `value` and `key` are base64-encoded; `offset` and `partition` locate
/// the message within the stream.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Base64-encoded record key, if the producer set one.
    #[serde(default)]
    pub key: Option<String>,
    /// Base64-encoded record value.
    pub value: String,
    /// Offset within the partition.
    pub offset: i64,
    /// Partition the message was read from.
    #[serde(default)]
    pub partition: String,
    /// Produce timestamp in milliseconds since epoch, when provided.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Message {
    /// Decode the base64 value to raw bytes.
    pub fn decode_value(&self) -> Result<Bytes, DecodeError> {
        Ok(Bytes::from(STANDARD.decode(&self.value)?))
    }

    /// Decode the base64 value to UTF-8 text.
    pub fn decode_text(&self) -> Result<String, DecodeError> {
        Ok(String::from_utf8(STANDARD.decode(&self.value)?)?)
    }

    /// Decode the base64 key to raw bytes, if a key is present.
    pub fn decode_key(&self) -> Result<Option<Bytes>, DecodeError> {
        match &self.key {
            Some(key) => Ok(Some(Bytes::from(STANDARD.decode(key)?))),
            None => Ok(None),
        }
    }
}

/// One fetch response: an ordered batch plus the token for the next fetch.
///
/// The batch is delivered in full, in order, before the next fetch is
/// issued; `next_cursor` replaces the cursor the batch was fetched with.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    pub messages: Vec<Message>,
    pub next_cursor: Cursor,
}

impl MessageBatch {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
