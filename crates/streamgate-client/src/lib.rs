//! Client library for the streaming service message plane.
//!
//! Provides a typed async REST client for the two operations a consumer
//! needs (creating a consumer-group cursor and fetching message batches
//! with it) plus the wire types, base64 value decoding, and a retry
//! policy for transient failures.
//!
//! ## Architecture
//!
//! ```text
//! ConsumeLoop → StreamApi (trait)
//!                 └─ StreamClient → reqwest → message endpoint
//! ```
//!
//! The service tracks consumer-group positions itself: creating a cursor
//! with `commitOnGet` means every fetch commits the group's progress as a
//! side effect, giving at-least-once delivery with no separate commit
//! call.
//!
//! ## Example
//!
//! ```ignore
//! use streamgate_client::{GroupCursorDetails, StreamApi, StreamClient};
//!
//! let client = StreamClient::new(endpoint, stream_id)?;
//! let details = GroupCursorDetails::at_time("example-group", "example-instance-0",
//!     "2026-08-07T12:00:00Z");
//! let mut cursor = client.create_group_cursor(&details).await?;
//!
//! loop {
//!     let batch = client.get_messages(&cursor, 10000).await?;
//!     for message in &batch.messages {
//!         println!("{}", message.decode_text()?);
//!     }
//!     cursor = batch.next_cursor;
//! }
//! ```

pub mod client;
pub mod cursor;
pub mod error;
pub mod messages;
pub mod retry;

pub use client::{StreamApi, StreamClient};
pub use cursor::{Cursor, CursorKind, GroupCursorDetails};
pub use error::{ClientError, Result};
pub use messages::{DecodeError, Message, MessageBatch};
pub use retry::{retry_with_backoff, retry_with_jittered_backoff, RetryPolicy, RetryingApi};
