//! Token-bucket rate governor.
//!
//! The bucket starts with one token and refills continuously at the target
//! rate. A caller that finds the bucket empty reserves the next token and
//! sleeps until it would have been refilled.
//!
//! Tokio timers fire on millisecond ticks, so above 1000 messages/s a sleep
//! always overshoots its deadline. The bucket may therefore hold up to one
//! tick's worth of tokens (never less than one) so that the overshoot is not
//! lost. A caller that falls behind gets at most that much credit.

use crate::error::GovernorError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

const CAPACITY: f64 = 1.0;

/// Granularity of the Tokio timer wheel.
const TIMER_TICK: Duration = Duration::from_millis(1);

/// Paces callers to a fixed number of operations per second.
#[derive(Debug)]
pub struct RateGovernor {
    rate: f64,
    /// Most tokens the bucket can hold.
    ceiling: f64,
    /// Available tokens. Negative while callers hold reservations.
    tokens: f64,
    last_refill: Instant,
}

impl RateGovernor {
    /// Create a governor for `rate` operations per second, starting with a full bucket.
    pub fn new(rate: f64) -> Result<Self, GovernorError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GovernorError::InvalidRate(rate));
        }

        Ok(Self {
            rate,
            ceiling: CAPACITY.max(rate * TIMER_TICK.as_secs_f64()),
            tokens: CAPACITY,
            last_refill: Instant::now(),
        })
    }

    /// Target rate in operations per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Block until a token is available, then consume it.
    ///
    /// Returns [`GovernorError::Cancelled`] if `cancel` fires first. The
    /// reserved token is handed back if the wait is cancelled or the future is
    /// dropped before it completes.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<(), GovernorError> {
        if cancel.is_cancelled() {
            return Err(GovernorError::Cancelled);
        }

        let now = Instant::now();
        let delay = self.reserve(now);
        if delay.is_zero() {
            return Ok(());
        }

        trace!("Waiting {:?} for next token", delay);
        let reservation = Reservation {
            tokens: Some(&mut self.tokens),
        };
        tokio::select! {
            _ = tokio::time::sleep_until(now + delay) => {
                reservation.keep();
                Ok(())
            }
            _ = cancel.cancelled() => Err(GovernorError::Cancelled),
        }
    }

    /// Take one token and return how long the caller must wait for it.
    fn reserve(&mut self, now: Instant) -> Duration {
        self.refill(now);
        self.tokens -= 1.0;

        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.rate)
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.ceiling);
        self.last_refill = now;
    }
}

/// A token taken ahead of time. Handed back on drop unless kept.
struct Reservation<'a> {
    tokens: Option<&'a mut f64>,
}

impl Reservation<'_> {
    fn keep(mut self) {
        self.tokens = None;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Some(tokens) = self.tokens.take() {
            *tokens += 1.0;
        }
    }
}
