//! Error types for the send loop and its collaborators.

use thiserror::Error;

/// Boxed error returned by a Kafka client library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single `write` that did not succeed.
///
/// Send errors are recoverable: the send loop logs them and moves on.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("{backend}: {source}")]
    Broker {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{backend}: producer is closed")]
    Closed { backend: &'static str },
}

impl SendError {
    /// Wrap a client error together with the name of the backend that hit it.
    pub fn broker(backend: &'static str, source: impl Into<BoxError>) -> Self {
        SendError::Broker {
            backend,
            source: source.into(),
        }
    }

    /// Name of the backend that produced this error.
    pub fn backend(&self) -> &'static str {
        match self {
            SendError::Broker { backend, .. } | SendError::Closed { backend } => backend,
        }
    }
}

/// Errors from the rate governor.
#[derive(Error, Debug, PartialEq)]
pub enum GovernorError {
    #[error("rate governor wait cancelled")]
    Cancelled,

    #[error("invalid target rate: {0} (must be a positive, finite number of messages/s)")]
    InvalidRate(f64),
}

/// Reasons the send loop stops. All of them are fatal for the harness.
#[derive(Error, Debug)]
pub enum SendLoopError {
    #[error("rate governor failed: {0}")]
    Governor(#[from] GovernorError),
}
