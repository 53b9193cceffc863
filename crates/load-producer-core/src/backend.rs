//! The producer abstraction the send loop drives.

use crate::error::SendError;
use bytes::Bytes;
use std::time::Duration;

/// One strategy for publishing messages to the broker.
///
/// A backend is built once at startup, targets a single topic, and leaves the
/// partition choice to the broker client. What a successful `write` means
/// depends on the implementation:
///
/// - synchronous backends return once the broker acknowledged the message
///   per the configured acks setting, and return the broker's error otherwise;
/// - asynchronous backends return once the message is queued locally, so
///   delivery failures after that point are never reported here;
/// - batching backends return once the message is accepted into a batch,
///   or once that batch is acknowledged when running synchronously.
#[async_trait::async_trait]
pub trait ProducerBackend: Send {
    /// Short name used in log lines, e.g. `"future"`.
    fn name(&self) -> &'static str;

    /// Publish one payload.
    async fn write(&mut self, payload: Bytes) -> Result<(), SendError>;

    /// Wait for locally queued messages to be handed to the broker.
    async fn flush(&mut self, _timeout: Duration) -> Result<(), SendError> {
        Ok(())
    }
}
