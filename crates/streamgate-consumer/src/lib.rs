//! Gated consumer daemon for a partitioned, append-only log.
//!
//! The daemon runs one sequential consume loop per partition. Each loop
//! samples an externally-owned gate flag every cycle: while the gate is
//! open it fetches message batches with a server-tracked consumer-group
//! cursor and hands each decoded message to a sink, in order; while the
//! gate is closed it holds no cursor and keeps refreshing a rewind
//! point, so re-enabling starts consumption from "lookback before
//! re-enable" rather than where it left off.
//!
//! ## Architecture
//!
//! ```text
//! GateChecker ──▶ PartitionWorker ──▶ StreamApi (cursor create / fetch)
//!                      │                      │
//!                      ▼                      ▼
//!                    Sink ◀── decoded ── message endpoint
//! ```
//!
//! Delivery is at-least-once: the service commits the group position as
//! a side effect of each fetch (`commitOnGet`), so sinks must tolerate
//! replays and a crash between fetch and delivery can replay or lose the
//! in-flight batch. Downstream processing should be idempotent.

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod sink;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use config::{ConsumerConfig, GateConfig};
pub use error::{ConsumerError, Result};
pub use gate::{GateChecker, GateTarget, ObjectStorageGate, StaticGate};
pub use sink::{DeliveredMessage, Sink, StdoutSink};
pub use worker::{LoopState, PartitionWorker, TickOutcome};
