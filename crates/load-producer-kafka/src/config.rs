//! Producer configuration shared by every backend.

use crate::error::{BackendError, Result};
use clap::ValueEnum;
use rdkafka::ClientConfig;
use std::fmt;
use std::time::Duration;

/// librdkafka's upper bound for `batch.num.messages`.
const MAX_BATCH_MESSAGES: usize = 1_000_000;
/// librdkafka's upper bound for `linger.ms`.
const MAX_LINGER: Duration = Duration::from_millis(900_000);

/// Which producer backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process batches flushed on size or timeout
    Batching,
    /// `FutureProducer`; waits for each delivery unless running async
    Future,
    /// `ThreadedProducer`; always enqueue-and-return
    Threaded,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Batching => write!(f, "batching"),
            BackendKind::Future => write!(f, "future"),
            BackendKind::Threaded => write!(f, "threaded"),
        }
    }
}

/// Broker acknowledgment a send waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// Wait for all in-sync replicas.
    All,
    /// Do not wait for the broker at all.
    None,
}

impl Acks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::None => "0",
        }
    }
}

/// Configuration for a producer backend.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Topic every message is published to
    pub topic: String,
    /// Messages per batch
    pub batch_size: usize,
    /// Longest a message waits in a partial batch
    pub batch_timeout: Duration,
    /// Return from `write` without waiting for the broker
    pub async_mode: bool,
    /// Bound on the startup metadata fetch
    pub connect_timeout: Duration,
    /// How long librdkafka keeps retrying a message before failing it
    pub message_timeout: Duration,
    /// How long a send may wait for room in the local queue
    pub queue_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: "127.0.0.1:29092".to_string(),
            topic: "test-topic".to_string(),
            batch_size: 50,
            batch_timeout: Duration::from_secs(1),
            async_mode: false,
            connect_timeout: Duration::from_secs(10),
            message_timeout: Duration::from_secs(30),
            queue_timeout: Duration::from_secs(5),
        }
    }
}

impl ProducerConfig {
    /// Acknowledgment mode derived from the async flag.
    pub fn acks(&self) -> Acks {
        if self.async_mode {
            Acks::None
        } else {
            Acks::All
        }
    }

    /// Check the values librdkafka would otherwise reject at creation time.
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(BackendError::InvalidConfig(
                "broker address must not be empty".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(BackendError::InvalidConfig(
                "topic must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_MESSAGES {
            return Err(BackendError::InvalidConfig(format!(
                "batch size must be between 1 and {MAX_BATCH_MESSAGES}, got {}",
                self.batch_size
            )));
        }
        if self.batch_timeout > MAX_LINGER {
            return Err(BackendError::InvalidConfig(format!(
                "batch timeout must be at most {MAX_LINGER:?}, got {:?}",
                self.batch_timeout
            )));
        }
        Ok(())
    }

    /// librdkafka client settings for this configuration.
    ///
    /// `batch.num.messages` carries the batch size; `batch.size` is a byte
    /// limit in librdkafka and is left at its default.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("batch.num.messages", self.batch_size.to_string())
            .set("linger.ms", self.batch_timeout.as_millis().to_string())
            .set("acks", self.acks().as_str())
            .set(
                "message.timeout.ms",
                self.message_timeout.as_millis().to_string(),
            );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acks_follow_async_flag() {
        let sync = ProducerConfig::default();
        assert_eq!(sync.acks(), Acks::All);

        let async_config = ProducerConfig {
            async_mode: true,
            ..Default::default()
        };
        assert_eq!(async_config.acks(), Acks::None);
    }

    #[test]
    fn test_client_config_values() {
        let config = ProducerConfig {
            brokers: "kafka:9092".to_string(),
            batch_size: 10,
            batch_timeout: Duration::from_millis(250),
            async_mode: true,
            ..Default::default()
        };
        let client = config.client_config();

        assert_eq!(client.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(client.get("batch.num.messages"), Some("10"));
        assert_eq!(client.get("linger.ms"), Some("250"));
        assert_eq!(client.get("acks"), Some("0"));
        assert_eq!(client.get("message.timeout.ms"), Some("30000"));
        assert_eq!(client.get("batch.size"), None);
    }

    #[test]
    fn test_validate() {
        assert!(ProducerConfig::default().validate().is_ok());

        let zero_batch = ProducerConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_batch.validate(),
            Err(BackendError::InvalidConfig(_))
        ));

        let long_linger = ProducerConfig {
            batch_timeout: Duration::from_secs(3600),
            ..Default::default()
        };
        assert!(long_linger.validate().is_err());

        let no_topic = ProducerConfig {
            topic: " ".to_string(),
            ..Default::default()
        };
        assert!(no_topic.validate().is_err());
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::Batching.to_string(), "batching");
        assert_eq!(
            BackendKind::from_str("threaded", true).unwrap(),
            BackendKind::Threaded
        );
        assert!(BackendKind::from_str("sarama", true).is_err());
    }
}
