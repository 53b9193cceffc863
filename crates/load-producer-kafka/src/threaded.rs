//! Backend built on rdkafka's `ThreadedProducer`.

use crate::config::ProducerConfig;
use crate::connect::check_brokers;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use load_producer_core::{ProducerBackend, SendError};
use rdkafka::client::ClientContext;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "threaded";

/// Producer context that tallies delivery reports on librdkafka's poll thread.
///
/// Nothing here is reported back to `write`; the totals only exist for
/// inspection after the fact.
#[derive(Debug, Clone, Default)]
pub struct DeliveryTally {
    delivered: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl DeliveryTally {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ClientContext for DeliveryTally {}

impl ProducerContext for DeliveryTally {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(_) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err((err, _)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                debug!("Delivery failed: {err}");
            }
        }
    }
}

/// Publishes through a `ThreadedProducer`, enqueueing and returning at once.
///
/// Only local enqueue failures (for example a full queue) reach the caller,
/// whatever the acks setting. With the async flag off the broker is still asked
/// for `acks=all`, but that only affects the delivery reports in the tally.
pub struct ThreadedBackend {
    producer: Arc<ThreadedProducer<DeliveryTally>>,
    topic: String,
    tally: DeliveryTally,
}

impl ThreadedBackend {
    /// Create the producer and verify the brokers are reachable. Blocks.
    pub fn connect(config: &ProducerConfig) -> Result<Self> {
        config.validate()?;

        let tally = DeliveryTally::default();
        let producer: ThreadedProducer<DeliveryTally> =
            config.client_config().create_with_context(tally.clone())?;
        check_brokers(producer.client(), config)?;

        debug!(
            "Created threaded producer for topic '{}' (acks={})",
            config.topic,
            config.acks().as_str()
        );

        Ok(Self {
            producer: Arc::new(producer),
            topic: config.topic.clone(),
            tally,
        })
    }

    /// Delivery reports received so far.
    pub fn tally(&self) -> &DeliveryTally {
        &self.tally
    }
}

#[async_trait]
impl ProducerBackend for ThreadedBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn write(&mut self, payload: Bytes) -> std::result::Result<(), SendError> {
        let record = BaseRecord::<(), [u8]>::to(&self.topic).payload(&payload[..]);
        self.producer
            .send(record)
            .map_err(|(err, _)| SendError::broker(NAME, err))
    }

    async fn flush(&mut self, timeout: Duration) -> std::result::Result<(), SendError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| SendError::broker(NAME, e))?
            .map_err(|e| SendError::broker(NAME, e))?;

        debug!(
            "Flushed threaded producer: {} delivered, {} failed",
            self.tally.delivered(),
            self.tally.failed()
        );
        Ok(())
    }
}
