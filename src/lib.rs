//! kafka-load-producer
//!
//! Publishes a fixed placeholder message to a Kafka topic at a steady rate
//! through one of several producer backends, and logs the achieved
//! throughput every five seconds.
//!
//! # CLI Usage
//!
//! ```bash
//! # 500 messages/s through the batching backend (the defaults)
//! kafka-load-producer -b localhost:9092
//!
//! # 2000 messages/s, fire-and-forget through the threaded producer
//! kafka-load-producer --mps 2000 -a -l threaded
//!
//! # Synchronous FutureProducer, small batches
//! kafka-load-producer -l future -s 10 -t 100ms
//! ```
//!
//! The send loop only stops on a fatal error: the backend failing to reach
//! the brokers at startup, or the rate governor's wait being cancelled
//! (Ctrl-C). Both exit non-zero.

pub mod config;

pub use config::{Cli, Settings};

use anyhow::Context;
use load_producer_core::{
    LoopStats, ProducerBackend, RateGovernor, Reporter, SendLoop, SendLoopError,
    ThroughputCounter, REPORT_INTERVAL,
};
use load_producer_kafka::build_backend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long to wait for queued messages once the send loop has stopped.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// A send loop and its reporter, sharing one throughput counter.
pub struct Harness {
    counter: Arc<ThroughputCounter>,
    reporter: Reporter,
    send_loop: SendLoop,
}

impl Harness {
    pub fn new(
        backend: Box<dyn ProducerBackend>,
        messages_per_second: f64,
    ) -> Result<Self, SendLoopError> {
        let counter = Arc::new(ThroughputCounter::new());
        let governor = RateGovernor::new(messages_per_second)?;

        Ok(Self {
            reporter: Reporter::new(counter.clone(), REPORT_INTERVAL),
            send_loop: SendLoop::new(backend, governor, counter.clone()),
            counter,
        })
    }

    pub fn counter(&self) -> Arc<ThroughputCounter> {
        self.counter.clone()
    }

    /// Every rate the reporter logs.
    pub fn reports(&self) -> watch::Receiver<f64> {
        self.reporter.subscribe()
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        self.send_loop.stats()
    }

    /// Run the reporter in the background and the send loop in the foreground
    /// until the loop fails, then flush the backend.
    pub async fn run(self, cancel: &CancellationToken) -> SendLoopError {
        let Self {
            reporter,
            mut send_loop,
            ..
        } = self;

        let reporter = tokio::spawn(reporter.run());
        let stats = send_loop.stats();

        let err = match send_loop.run(cancel).await {
            Ok(never) => match never {},
            Err(e) => e,
        };
        reporter.abort();

        info!(
            "Send loop stopped after {} sent and {} failed writes",
            stats.sent(),
            stats.failed()
        );

        let mut backend = send_loop.into_backend();
        if let Err(e) = backend.flush(SHUTDOWN_FLUSH_TIMEOUT).await {
            warn!("Failed to flush '{}' backend: {e}", backend.name());
        }

        err
    }
}

/// Build the configured backend and run the harness. Only returns on error.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    println!("{settings}");

    let kind = settings.backend;
    let producer = settings.producer.clone();
    info!(
        "Connecting '{}' backend to {} (topic '{}', async={})",
        kind, producer.brokers, producer.topic, producer.async_mode
    );
    let backend = tokio::task::spawn_blocking(move || build_backend(kind, &producer))
        .await
        .context("Backend construction task failed")?
        .with_context(|| format!("Failed to create '{kind}' backend"))?;

    let harness = Harness::new(backend, f64::from(settings.messages_per_second))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling the rate governor");
                cancel.cancel();
            }
        });
    }

    let err = harness.run(&cancel).await;
    Err(err).context("Send loop stopped")
}
