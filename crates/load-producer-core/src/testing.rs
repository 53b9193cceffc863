//! In-memory backends for exercising the send loop without a broker.

use crate::backend::ProducerBackend;
use crate::error::SendError;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Succeeds, except on every `k`th call where it returns an injected error.
#[derive(Debug, Default)]
pub struct FlakyBackend {
    every: u64,
    calls: Arc<AtomicU64>,
    last_payload: Arc<Mutex<Option<Bytes>>>,
}

impl FlakyBackend {
    /// Fail calls `k`, `2k`, `3k`, ... A `k` of zero never fails.
    pub fn failing_every(k: u64) -> Self {
        Self {
            every: k,
            ..Default::default()
        }
    }

    pub fn never_failing() -> Self {
        Self::failing_every(0)
    }

    /// Number of `write` calls seen so far.
    pub fn calls(&self) -> Arc<AtomicU64> {
        self.calls.clone()
    }

    /// The payload of the most recent `write`.
    pub fn last_payload(&self) -> Arc<Mutex<Option<Bytes>>> {
        self.last_payload.clone()
    }
}

#[async_trait::async_trait]
impl ProducerBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn write(&mut self, payload: Bytes) -> Result<(), SendError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut last) = self.last_payload.lock() {
            *last = Some(payload);
        }

        if self.every > 0 && call % self.every == 0 {
            return Err(SendError::broker(
                self.name(),
                std::io::Error::other(format!("injected failure on call {call}")),
            ));
        }
        Ok(())
    }
}

/// Fire-and-forget backend that reports success and delivers nothing.
///
/// Mirrors an asynchronous producer whose deliveries all fail after `write`
/// returned: the loop counts every message while `dropped` shows none arrived.
#[derive(Debug, Default)]
pub struct BlackHoleBackend {
    dropped: Arc<AtomicU64>,
}

impl BlackHoleBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted and silently lost.
    pub fn dropped(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

#[async_trait::async_trait]
impl ProducerBackend for BlackHoleBackend {
    fn name(&self) -> &'static str {
        "black-hole"
    }

    async fn write(&mut self, _payload: Bytes) -> Result<(), SendError> {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Synchronous-style backend whose every `write` takes a fixed latency.
#[derive(Debug)]
pub struct SlowBackend {
    latency: Duration,
}

impl SlowBackend {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait::async_trait]
impl ProducerBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn write(&mut self, _payload: Bytes) -> Result<(), SendError> {
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}
