//! Core of the kafka-load-producer harness.
//!
//! This crate holds everything that does not depend on a particular Kafka
//! client: the producer abstraction, the token-bucket rate governor, the send
//! loop that ties them together, and the throughput accounting that the
//! periodic reporter reads.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │  RateGovernor   │
//!                 │  (capacity 1)   │
//!                 └────────┬────────┘
//!                          │ wait()
//!                          ▼
//! ┌─────────────────┐  write()  ┌─────────────────┐
//! │ ProducerBackend │◀──────────│    SendLoop     │
//! └─────────────────┘           └────────┬────────┘
//!                                        │ increment()
//!                                        ▼
//!                               ┌─────────────────┐   rate()   ┌──────────┐
//!                               │ThroughputCounter│◀───────────│ Reporter │
//!                               └─────────────────┘            └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use load_producer_core::{RateGovernor, Reporter, SendLoop, ThroughputCounter};
//! use load_producer_core::testing::BlackHoleBackend;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let counter = Arc::new(ThroughputCounter::new());
//! tokio::spawn(Reporter::new(counter.clone(), load_producer_core::REPORT_INTERVAL).run());
//!
//! let governor = RateGovernor::new(500.0)?;
//! let mut send_loop = SendLoop::new(Box::new(BlackHoleBackend::new()), governor, counter);
//! send_loop.run(&CancellationToken::new()).await?;
//! ```

pub mod backend;
pub mod counter;
pub mod error;
pub mod governor;
pub mod reporter;
pub mod send_loop;
pub mod testing;

pub use backend::ProducerBackend;
pub use counter::{ThroughputCounter, DEFAULT_WINDOW};
pub use error::{GovernorError, SendError, SendLoopError};
pub use governor::RateGovernor;
pub use reporter::{Reporter, REPORT_INTERVAL};
pub use send_loop::{LoopStats, SendLoop, PLACEHOLDER_PAYLOAD};
