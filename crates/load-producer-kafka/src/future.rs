//! Backend built on rdkafka's `FutureProducer`.

use crate::config::ProducerConfig;
use crate::connect::check_brokers;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use load_producer_core::{ProducerBackend, SendError};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::debug;

const NAME: &str = "future";

/// Publishes through a `FutureProducer`.
///
/// In synchronous mode every `write` waits for the delivery report, so the
/// broker's error comes back verbatim. In async mode the message is only
/// enqueued and the delivery future is dropped: failures after that point are
/// never seen by the caller.
pub struct FutureBackend {
    producer: FutureProducer,
    topic: String,
    async_mode: bool,
    queue_timeout: Duration,
}

impl FutureBackend {
    /// Create the producer and verify the brokers are reachable. Blocks.
    pub fn connect(config: &ProducerConfig) -> Result<Self> {
        config.validate()?;

        let producer: FutureProducer = config.client_config().create()?;
        check_brokers(producer.client(), config)?;

        debug!(
            "Created future producer for topic '{}' (acks={})",
            config.topic,
            config.acks().as_str()
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            async_mode: config.async_mode,
            queue_timeout: config.queue_timeout,
        })
    }
}

#[async_trait]
impl ProducerBackend for FutureBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn write(&mut self, payload: Bytes) -> std::result::Result<(), SendError> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload[..]);

        if self.async_mode {
            // Dropping the delivery future does not cancel the delivery.
            return match self.producer.send_result(record) {
                Ok(_delivery) => Ok(()),
                Err((err, _)) => Err(SendError::broker(NAME, err)),
            };
        }

        self.producer
            .send(record, self.queue_timeout)
            .await
            .map(|_| ())
            .map_err(|(err, _)| SendError::broker(NAME, err))
    }

    async fn flush(&mut self, timeout: Duration) -> std::result::Result<(), SendError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| SendError::broker(NAME, e))?
            .map_err(|e| SendError::broker(NAME, e))
    }
}
