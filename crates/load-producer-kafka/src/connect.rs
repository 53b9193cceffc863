//! Startup connectivity check.

use crate::config::ProducerConfig;
use crate::error::{BackendError, Result};
use rdkafka::client::{Client, ClientContext};
use tracing::info;

/// Fetch cluster metadata once, failing fast if no broker answers.
///
/// librdkafka connects lazily, so without this a bad broker address would
/// only show up as per-message delivery errors. This is a blocking call.
pub(crate) fn check_brokers<C: ClientContext>(
    client: &Client<C>,
    config: &ProducerConfig,
) -> Result<()> {
    let metadata = client
        .fetch_metadata(None, config.connect_timeout)
        .map_err(|source| BackendError::Connect {
            brokers: config.brokers.clone(),
            source,
        })?;

    info!(
        "Connected to Kafka at {} ({} broker(s), {} topic(s))",
        config.brokers,
        metadata.brokers().len(),
        metadata.topics().len()
    );
    Ok(())
}
