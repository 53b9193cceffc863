//! Backend that batches messages in-process before handing them to Kafka.
//!
//! `write` passes each payload to a flusher task owned by the backend. The
//! flusher collects payloads until it has `batch_size` of them or
//! `batch_timeout` has passed since the first one arrived, whichever comes
//! first, and then writes the whole batch through a [`BatchSink`].
//!
//! ```text
//!  write() ──▶ mpsc ──▶ Batcher ──(size | timeout)──▶ BatchSink ──▶ Kafka
//!    ▲                     │
//!    └──── oneshot ack ────┘   (synchronous mode only)
//! ```
//!
//! In asynchronous mode `write` returns as soon as the payload is accepted.
//! In synchronous mode it waits for the batch holding its payload to be
//! written, so a caller that sends one message at a time sees one message per
//! `batch_timeout`.

use crate::config::ProducerConfig;
use crate::connect::check_brokers;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use load_producer_core::error::BoxError;
use load_producer_core::{ProducerBackend, SendError};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

const NAME: &str = "batching";

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Destination for full batches.
#[async_trait]
pub trait BatchSink: Send + 'static {
    /// Write every payload of the batch. One error fails the whole batch.
    async fn write_batch(&mut self, batch: Vec<Bytes>) -> std::result::Result<(), BoxError>;
}

struct Pending {
    payload: Bytes,
    ack: Option<oneshot::Sender<std::result::Result<(), SharedError>>>,
}

enum Command {
    Write(Pending),
    Flush(oneshot::Sender<()>),
}

/// Accumulates payloads and flushes them on size or timeout.
struct Batcher<S> {
    sink: S,
    batch_size: usize,
    batch_timeout: Duration,
}

impl<S: BatchSink> Batcher<S> {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut batch: Vec<Pending> = Vec::with_capacity(self.batch_size);

        loop {
            let first = match rx.recv().await {
                Some(Command::Write(pending)) => pending,
                Some(Command::Flush(done)) => {
                    let _ = done.send(());
                    continue;
                }
                None => break,
            };
            batch.push(first);

            let deadline = Instant::now() + self.batch_timeout;
            let mut flush_requested = None;
            while batch.len() < self.batch_size {
                match timeout_at(deadline, rx.recv()).await {
                    Ok(Some(Command::Write(pending))) => batch.push(pending),
                    Ok(Some(Command::Flush(done))) => {
                        flush_requested = Some(done);
                        break;
                    }
                    // Timed out, or the backend was dropped.
                    Ok(None) | Err(_) => break,
                }
            }

            self.flush(&mut batch).await;
            if let Some(done) = flush_requested {
                let _ = done.send(());
            }
        }

        debug!("Batcher stopped");
    }

    async fn flush(&mut self, batch: &mut Vec<Pending>) {
        let pending: Vec<Pending> = std::mem::take(batch);
        let payloads = pending.iter().map(|p| p.payload.clone()).collect();

        trace!("Flushing batch of {} message(s)", pending.len());
        let result = self
            .sink
            .write_batch(payloads)
            .await
            .map_err(SharedError::from);

        if let Err(e) = &result {
            debug!("Batch of {} message(s) failed: {e}", pending.len());
        }
        for p in pending {
            if let Some(ack) = p.ack {
                let _ = ack.send(result.clone());
            }
        }
    }
}

/// Writes batches to a Kafka topic through a `FutureProducer`.
pub struct KafkaBatchSink {
    producer: FutureProducer,
    topic: String,
    queue_timeout: Duration,
}

#[async_trait]
impl BatchSink for KafkaBatchSink {
    async fn write_batch(&mut self, batch: Vec<Bytes>) -> std::result::Result<(), BoxError> {
        let deliveries = batch.iter().map(|payload| {
            let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload[..]);
            self.producer.send(record, self.queue_timeout)
        });

        for delivery in join_all(deliveries).await {
            delivery.map_err(|(err, _)| err)?;
        }
        Ok(())
    }
}

/// Publishes through an in-process batch accumulator.
pub struct BatchingBackend {
    tx: mpsc::Sender<Command>,
    async_mode: bool,
    flusher: JoinHandle<()>,
}

impl BatchingBackend {
    /// Create the producer, verify the brokers are reachable and start the
    /// flusher task. Blocks; must be called from within a Tokio runtime.
    pub fn connect(config: &ProducerConfig) -> Result<Self> {
        config.validate()?;

        // Batching happens here, so librdkafka should send each batch at once.
        let mut client_config = config.client_config();
        client_config.set("linger.ms", "0");
        let producer: FutureProducer = client_config.create()?;
        check_brokers(producer.client(), config)?;

        debug!(
            "Created batching producer for topic '{}' (batch size {}, timeout {:?}, acks={})",
            config.topic,
            config.batch_size,
            config.batch_timeout,
            config.acks().as_str()
        );

        let sink = KafkaBatchSink {
            producer,
            topic: config.topic.clone(),
            queue_timeout: config.queue_timeout,
        };
        Ok(Self::with_sink(
            sink,
            config.batch_size,
            config.batch_timeout,
            config.async_mode,
        ))
    }

    /// Start a batching backend over an arbitrary sink.
    pub fn with_sink<S: BatchSink>(
        sink: S,
        batch_size: usize,
        batch_timeout: Duration,
        async_mode: bool,
    ) -> Self {
        let batch_size = batch_size.max(1);
        let (tx, rx) = mpsc::channel(batch_size);
        let batcher = Batcher {
            sink,
            batch_size,
            batch_timeout,
        };
        let flusher = tokio::spawn(batcher.run(rx));

        Self {
            tx,
            async_mode,
            flusher,
        }
    }

    /// Stop accepting messages and wait for the flusher to write what is left.
    pub async fn close(self) -> std::result::Result<(), SendError> {
        let Self { tx, flusher, .. } = self;
        drop(tx);
        flusher.await.map_err(|e| SendError::broker(NAME, e))
    }

    fn closed() -> SendError {
        SendError::Closed { backend: NAME }
    }
}

#[async_trait]
impl ProducerBackend for BatchingBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn write(&mut self, payload: Bytes) -> std::result::Result<(), SendError> {
        if self.async_mode {
            let pending = Pending { payload, ack: None };
            return self
                .tx
                .send(Command::Write(pending))
                .await
                .map_err(|_| Self::closed());
        }

        let (ack, acked) = oneshot::channel();
        let pending = Pending {
            payload,
            ack: Some(ack),
        };
        self.tx
            .send(Command::Write(pending))
            .await
            .map_err(|_| Self::closed())?;

        match acked.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SendError::broker(NAME, e)),
            Err(_) => Err(Self::closed()),
        }
    }

    async fn flush(&mut self, timeout: Duration) -> std::result::Result<(), SendError> {
        let (done, flushed) = oneshot::channel();
        self.tx
            .send(Command::Flush(done))
            .await
            .map_err(|_| Self::closed())?;

        match tokio::time::timeout(timeout, flushed).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Self::closed()),
            Err(elapsed) => Err(SendError::broker(NAME, elapsed)),
        }
    }
}
