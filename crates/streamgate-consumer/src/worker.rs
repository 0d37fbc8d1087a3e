//! Per-partition consume loop.
//!
//! One [`PartitionWorker`] owns one partition's cursor and gate cadence.
//! Each cycle it samples the gate, lazily creates or refreshes its
//! consumer-group cursor, fetches a bounded batch, delivers every message
//! to the sink in fetch order, advances to the batch's next-cursor, and
//! paces before the next cycle.
//!
//! ## State machine
//!
//! ```text
//!   GateClosed ──gate true──▶ GateOpenNoCursor ──cursor created──▶ GateOpenPolling ─┐
//!       ▲                          │                                    │  ▲        │
//!       │                          │                                    │  └────────┘
//!       └────────gate false────────┴────────────gate false──────────────┘  (fetch/deliver/advance)
//! ```
//!
//! Closing the gate discards the held cursor (the service tracks the
//! group position; no delete call exists) and fixes a fresh rewind point,
//! so the next open interval starts from "lookback before re-enable"
//! rather than the original start time.
//!
//! ## Failure policy
//!
//! No failure terminates the loop:
//! - gate lookup failures read as "closed this cycle" (inside the gate),
//! - cursor creation failures are retried on the next cycle,
//! - fetch failures (including throttling) back off and retry with the
//!   same held cursor; the loop never fabricates or advances past an
//!   unacknowledged cursor,
//! - a message that fails to decode is skipped with a structured report
//!   and the rest of the batch continues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use streamgate_client::{Cursor, GroupCursorDetails, MessageBatch, StreamApi};

use crate::clock::{rewind_timestamp, Clock};
use crate::config::ConsumerConfig;
use crate::gate::GateChecker;
use crate::sink::{DeliveredMessage, Sink};

/// Logical state of the consume loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Gate is closed; no cursor is held and the rewind point refreshes
    /// every cycle.
    GateClosed,
    /// Gate is open but cursor creation has not succeeded yet.
    GateOpenNoCursor,
    /// Steady state: fetching with a held cursor.
    GateOpenPolling,
}

/// What one cycle did, used to pick the pacing delay before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate was closed this cycle.
    GateClosed,
    /// Cursor creation failed; retried next cycle.
    CursorError,
    /// A batch was fetched and delivered.
    Fetched { delivered: usize, skipped: usize },
    /// The fetch failed; the held cursor is kept for the retry.
    FetchError,
}

/// Sequential consumer for a single partition.
///
/// Holds only its own transient state (current cursor, rewind point,
/// loop state); configuration and clients arrive constructed and are
/// never mutated.
pub struct PartitionWorker {
    config: Arc<ConsumerConfig>,
    partition: u32,
    instance_name: String,
    api: Arc<dyn StreamApi>,
    gate: Arc<dyn GateChecker>,
    clock: Arc<dyn Clock>,
    sink: Box<dyn Sink>,
    shutdown: watch::Receiver<bool>,

    state: LoopState,
    cursor: Option<Cursor>,
    rewind: String,
}

impl PartitionWorker {
    /// Create a worker for `partition`.
    ///
    /// The rewind point is computed immediately, before the first gate
    /// check, so a gate that is already open starts from "lookback
    /// before process start".
    pub fn new(
        config: Arc<ConsumerConfig>,
        partition: u32,
        api: Arc<dyn StreamApi>,
        gate: Arc<dyn GateChecker>,
        clock: Arc<dyn Clock>,
        sink: Box<dyn Sink>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let instance_name = config.instance_for_partition(partition);
        let rewind = rewind_timestamp(clock.now_utc(), config.rewind_window);
        Self {
            config,
            partition,
            instance_name,
            api,
            gate,
            clock,
            sink,
            shutdown,
            state: LoopState::GateClosed,
            cursor: None,
            rewind,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The rewind point the next cursor creation would use.
    pub fn rewind(&self) -> &str {
        &self.rewind
    }

    /// Run until shutdown is signalled.
    ///
    /// Shutdown is checked at the top of every cycle and raced against
    /// the pacing sleep; in-flight delivery completes before the worker
    /// exits.
    pub async fn run(mut self) {
        info!(
            partition = self.partition,
            instance = %self.instance_name,
            return_limit = self.config.return_limit,
            "partition worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let outcome = self.tick().await;
            let pace = self.pace_for(outcome);

            tokio::select! {
                _ = tokio::time::sleep(pace) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(partition = self.partition, "partition worker stopped");
    }

    /// Execute exactly one cycle of the state machine.
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.gate.is_enabled().await {
            if self.state != LoopState::GateClosed {
                info!(
                    partition = self.partition,
                    "gate closed, pausing consumption"
                );
            }
            // The cursor is abandoned, never deleted; the service keeps
            // tracking the group position.
            self.cursor = None;
            self.state = LoopState::GateClosed;
            self.rewind = rewind_timestamp(self.clock.now_utc(), self.config.rewind_window);
            return TickOutcome::GateClosed;
        }

        if self.state == LoopState::GateClosed {
            // Closed→open transition: the rewind point is fixed here and
            // stays stable for the whole open interval.
            self.rewind = rewind_timestamp(self.clock.now_utc(), self.config.rewind_window);
            info!(
                partition = self.partition,
                rewind = %self.rewind,
                "gate opened, resuming consumption"
            );
            self.state = LoopState::GateOpenNoCursor;
        }

        let cursor = match &self.cursor {
            Some(cursor) => cursor.clone(),
            None => {
                let details = GroupCursorDetails::at_time(
                    self.config.group_name.as_str(),
                    self.instance_name.as_str(),
                    self.rewind.as_str(),
                );
                info!(
                    group = %self.config.group_name,
                    instance = %self.instance_name,
                    time = %self.rewind,
                    "creating group cursor"
                );
                match self.api.create_group_cursor(&details).await {
                    Ok(cursor) => {
                        self.cursor = Some(cursor.clone());
                        self.state = LoopState::GateOpenPolling;
                        cursor
                    }
                    Err(e) => {
                        error!(
                            partition = self.partition,
                            error = %e,
                            "cursor creation failed, retrying next cycle"
                        );
                        return TickOutcome::CursorError;
                    }
                }
            }
        };

        match self.api.get_messages(&cursor, self.config.return_limit).await {
            Ok(batch) => {
                let next_cursor = batch.next_cursor.clone();
                let (delivered, skipped) = self.deliver_batch(&batch).await;
                // Advance only after the whole batch was handled.
                self.cursor = Some(next_cursor);
                TickOutcome::Fetched { delivered, skipped }
            }
            Err(e) => {
                warn!(
                    partition = self.partition,
                    error = %e,
                    "fetch failed, retrying with the same cursor"
                );
                TickOutcome::FetchError
            }
        }
    }

    /// Deliver a batch in fetch order. Returns (delivered, skipped).
    ///
    /// Undecodable messages are skipped with a structured report; a sink
    /// refusal is reported the same way. Neither aborts the batch. The
    /// service bounds batches at the configured limit; should a larger
    /// one ever arrive, it is still delivered in full.
    async fn deliver_batch(&mut self, batch: &MessageBatch) -> (usize, usize) {
        let mut delivered = 0;
        let mut skipped = 0;

        for message in &batch.messages {
            let text = match message.decode_text() {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        partition = self.partition,
                        offset = message.offset,
                        error = %e,
                        "skipping undecodable message"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let partition = if message.partition.is_empty() {
                self.partition.to_string()
            } else {
                message.partition.clone()
            };

            let delivered_message = DeliveredMessage {
                text,
                offset: message.offset,
                partition,
            };

            match self.sink.deliver(&delivered_message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(
                        partition = self.partition,
                        offset = message.offset,
                        error = %e,
                        "sink rejected message"
                    );
                    skipped += 1;
                }
            }
        }

        (delivered, skipped)
    }

    /// Pacing delay after a cycle.
    ///
    /// Fetch failures (including throttling) back off for at least the
    /// pacing interval, doubled to stay clear of the throttle window.
    fn pace_for(&self, outcome: TickOutcome) -> Duration {
        match outcome {
            TickOutcome::FetchError => self.config.poll_interval.saturating_mul(2),
            _ => self.config.poll_interval,
        }
    }
}
