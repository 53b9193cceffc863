//! Kafka producer backends for kafka-load-producer, built on rdkafka.
//!
//! Features:
//!
//! - `future`: `FutureProducer`, waiting for every delivery report unless
//!   running in async mode
//! - `threaded`: `ThreadedProducer`, enqueue-and-return with delivery reports
//!   tallied on the side
//! - `batching`: an in-process accumulator that flushes on batch size or
//!   timeout, whichever comes first
//!
//! Every backend publishes to one topic with no key and no partition, so
//! librdkafka's partitioner picks the partition. Construction fetches cluster
//! metadata once and fails if no broker answers in time; there is no retry.

pub mod batching;
pub mod config;
mod connect;
pub mod error;
pub mod future;
pub mod threaded;

pub use batching::{BatchSink, BatchingBackend, KafkaBatchSink};
pub use config::{Acks, BackendKind, ProducerConfig};
pub use error::{BackendError, Result};
pub use future::FutureBackend;
pub use threaded::{DeliveryTally, ThreadedBackend};

use load_producer_core::ProducerBackend;

/// Build the selected backend. Blocks while it checks the brokers.
///
/// The batching backend spawns its flusher task, so this must run inside a
/// Tokio runtime (a `spawn_blocking` closure qualifies).
pub fn build_backend(
    kind: BackendKind,
    config: &ProducerConfig,
) -> Result<Box<dyn ProducerBackend>> {
    let backend: Box<dyn ProducerBackend> = match kind {
        BackendKind::Batching => Box::new(BatchingBackend::connect(config)?),
        BackendKind::Future => Box::new(FutureBackend::connect(config)?),
        BackendKind::Threaded => Box::new(ThreadedBackend::connect(config)?),
    };
    Ok(backend)
}
