//! Periodic throughput reporting.

use crate::counter::ThroughputCounter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// How often the harness reports throughput.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Background task that logs the counter's rate once per period.
///
/// The latest reading is also published on a watch channel so callers can
/// observe it without scraping logs.
pub struct Reporter {
    counter: Arc<ThroughputCounter>,
    period: Duration,
    latest: watch::Sender<f64>,
}

impl Reporter {
    pub fn new(counter: Arc<ThroughputCounter>, period: Duration) -> Self {
        let (latest, _) = watch::channel(0.0);
        Self {
            counter,
            period,
            latest,
        }
    }

    /// Receive every rate the reporter logs.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.latest.subscribe()
    }

    /// Read the counter, log the rate and publish it.
    pub fn report(&self) -> f64 {
        let rate = self.counter.rate();
        info!("{rate:.1} messages/s");
        self.latest.send_replace(rate);
        rate
    }

    /// Report once per period, starting one period from now, forever.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_report_after_one_period() {
        let counter = Arc::new(ThroughputCounter::new());
        let reporter = Reporter::new(counter.clone(), REPORT_INTERVAL);
        let mut rx = reporter.subscribe();
        let start = Instant::now();
        tokio::spawn(reporter.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        counter.increment(25);

        rx.changed().await.unwrap();
        assert_eq!(start.elapsed(), REPORT_INTERVAL);
        assert_eq!(*rx.borrow_and_update(), 5.0);

        rx.changed().await.unwrap();
        assert_eq!(start.elapsed(), REPORT_INTERVAL * 2);
        assert_eq!(*rx.borrow_and_update(), 0.0);
    }

    #[test]
    fn test_report_reads_counter() {
        let counter = Arc::new(ThroughputCounter::new());
        counter.increment(50);
        let reporter = Reporter::new(counter, REPORT_INTERVAL);

        assert_eq!(reporter.report(), 10.0);
        assert_eq!(*reporter.subscribe().borrow(), 10.0);
    }
}
