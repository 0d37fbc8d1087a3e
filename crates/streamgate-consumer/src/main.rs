//! streamgate daemon entry point.
//!
//! Reads configuration from the environment, spawns one partition worker
//! per configured partition, and runs until SIGINT or SIGTERM.
//!
//! ## Configuration
//! All configuration is done via environment variables; see the config
//! module table. Minimal invocation:
//!
//! ```bash
//! export STREAMGATE_ENDPOINT=https://cell-1.streaming.us-ashburn-1.example.com
//! export STREAMGATE_STREAM_ID=ocid1.stream.oc1.iad.example
//! streamgate
//! ```
//!
//! ## Logging
//! Controlled via `RUST_LOG` (default `info`):
//!
//! ```bash
//! RUST_LOG=debug streamgate
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

use streamgate_client::{RetryPolicy, RetryingApi, StreamApi, StreamClient};
use streamgate_consumer::{
    ConsumerConfig, GateChecker, ObjectStorageGate, PartitionWorker, StaticGate, StdoutSink,
    SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(ConsumerConfig::from_env().context("loading configuration")?);

    info!(
        stream = %config.stream_id,
        group = %config.group_name,
        partitions = config.partitions,
        return_limit = config.return_limit,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        rewind_secs = config.rewind_window.as_secs(),
        "streamgate starting"
    );

    let client = Arc::new(
        StreamClient::new(config.endpoint.as_str(), config.stream_id.as_str())
            .context("building stream client")?,
    );
    // Smooth transient fetch failures before they reach the loop's own
    // cycle-level backoff.
    let api: Arc<dyn StreamApi> = Arc::new(RetryingApi::new(client, RetryPolicy::default()));

    let gate: Arc<dyn GateChecker> = match &config.gate.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, dr = config.gate.is_dr, "gate authority configured");
            Arc::new(
                ObjectStorageGate::new(endpoint.as_str(), config.gate.target())
                    .context("building gate checker")?,
            )
        }
        None => {
            info!("no gate authority configured, consumption always enabled");
            Arc::new(StaticGate(true))
        }
    };

    let clock = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = JoinSet::new();
    for partition in 0..config.partitions {
        let worker = PartitionWorker::new(
            Arc::clone(&config),
            partition,
            api.clone(),
            gate.clone(),
            clock.clone(),
            Box::new(StdoutSink),
            shutdown_rx.clone(),
        );
        workers.spawn(worker.run());
    }

    // Flip the shutdown watch on SIGINT/SIGTERM; workers finish their
    // in-flight delivery and exit.
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT, initiating graceful shutdown");
            },
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            },
        }

        let _ = shutdown_tx.send(true);
    });

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "partition worker task failed");
        }
    }

    info!("streamgate shut down gracefully");
    Ok(())
}
