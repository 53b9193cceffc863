//! Error types for building Kafka producer backends.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors raised while constructing a backend. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Failed to connect to Kafka brokers at {brokers}: {source}")]
    Connect {
        brokers: String,
        #[source]
        source: KafkaError,
    },

    #[error("Invalid producer configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
