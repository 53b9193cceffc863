//! The rate-governed send loop.
//!
//! Each iteration waits for a token from the [`RateGovernor`], hands the
//! placeholder payload to the active [`ProducerBackend`], and counts the
//! outcome. Send failures are logged and skipped; only the governor can stop
//! the loop.

use crate::backend::ProducerBackend;
use crate::counter::ThroughputCounter;
use crate::error::SendLoopError;
use crate::governor::RateGovernor;
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Payload sent on every iteration.
pub const PLACEHOLDER_PAYLOAD: &[u8] = b"{}";

/// Running totals of send outcomes, readable while the loop runs.
#[derive(Debug, Default)]
pub struct LoopStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl LoopStats {
    /// Writes the backend accepted.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Writes the backend rejected.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Every write attempted so far.
    pub fn attempted(&self) -> u64 {
        self.sent() + self.failed()
    }
}

/// Drives one backend at the governor's pace.
pub struct SendLoop {
    backend: Box<dyn ProducerBackend>,
    governor: RateGovernor,
    counter: Arc<ThroughputCounter>,
    stats: Arc<LoopStats>,
    payload: Bytes,
}

impl SendLoop {
    pub fn new(
        backend: Box<dyn ProducerBackend>,
        governor: RateGovernor,
        counter: Arc<ThroughputCounter>,
    ) -> Self {
        Self {
            backend,
            governor,
            counter,
            stats: Arc::new(LoopStats::default()),
            payload: Bytes::from_static(PLACEHOLDER_PAYLOAD),
        }
    }

    /// Replace the placeholder payload.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Shared handle to the loop's outcome totals.
    pub fn stats(&self) -> Arc<LoopStats> {
        self.stats.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Give the backend back, e.g. to flush it after the loop stopped.
    pub fn into_backend(self) -> Box<dyn ProducerBackend> {
        self.backend
    }

    /// Run until the governor fails.
    ///
    /// The loop has no successful exit: it returns only when waiting on the
    /// governor fails, which callers should treat as fatal.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Infallible, SendLoopError> {
        info!(
            "Sending to '{}' backend at {} messages/s",
            self.backend.name(),
            self.governor.rate()
        );

        loop {
            self.governor.wait(cancel).await?;
            self.send_once().await;
        }
    }

    /// Write the payload once and record the outcome. Returns whether it succeeded.
    pub async fn send_once(&mut self) -> bool {
        match self.backend.write(self.payload.clone()).await {
            Ok(()) => {
                self.counter.increment(1);
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                error!("ERROR! {e}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GovernorError;
    use crate::testing::FlakyBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_once_counts_success_once() {
        let counter = Arc::new(ThroughputCounter::new());
        let backend = FlakyBackend::never_failing();
        let calls = backend.calls();
        let mut send_loop = SendLoop::new(
            Box::new(backend),
            RateGovernor::new(10.0).unwrap(),
            counter.clone(),
        );

        assert!(send_loop.send_once().await);
        assert_eq!(counter.count(), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(send_loop.stats().sent(), 1);
    }

    #[tokio::test]
    async fn test_send_once_does_not_count_failure() {
        let counter = Arc::new(ThroughputCounter::new());
        let mut send_loop = SendLoop::new(
            Box::new(FlakyBackend::failing_every(1)),
            RateGovernor::new(10.0).unwrap(),
            counter.clone(),
        );

        assert!(!send_loop.send_once().await);
        assert_eq!(counter.count(), 0);
        assert_eq!(send_loop.stats().failed(), 1);
        assert_eq!(send_loop.stats().sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_only_on_cancellation() {
        let counter = Arc::new(ThroughputCounter::new());
        let mut send_loop = SendLoop::new(
            Box::new(FlakyBackend::failing_every(2)),
            RateGovernor::new(100.0).unwrap(),
            counter.clone(),
        );
        let stats = send_loop.stats();
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { send_loop.run(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(995)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SendLoopError::Governor(GovernorError::Cancelled)
        ));
        assert_eq!(stats.attempted(), 100);
        assert_eq!(stats.failed(), 50);
        assert_eq!(counter.count(), 50);
    }

    #[tokio::test]
    async fn test_custom_payload_reaches_backend() {
        let backend = FlakyBackend::never_failing();
        let last = backend.last_payload();
        let mut send_loop = SendLoop::new(
            Box::new(backend),
            RateGovernor::new(10.0).unwrap(),
            Arc::new(ThroughputCounter::new()),
        )
        .with_payload(Bytes::from_static(b"hello"));

        send_loop.send_once().await;
        assert_eq!(
            last.lock().unwrap().as_deref(),
            Some(b"hello".as_slice())
        );
    }
}
