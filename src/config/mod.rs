//! Command-line configuration and its resolved, validated form.

pub mod duration;

use crate::config::duration::parse_duration;
use anyhow::Context;
use clap::Parser;
use load_producer_kafka::{BackendKind, ProducerConfig};
use std::fmt;
use std::time::Duration;

/// Command-line options. Every flag can also be set through the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "kafka-load-producer")]
#[command(about = "Publish messages to Kafka at a fixed rate and report achieved throughput")]
#[command(long_about = None)]
pub struct Cli {
    /// Batch size
    #[arg(short = 's', long, env = "LOAD_PRODUCER_BATCH_SIZE", default_value_t = 50)]
    pub batch_size: usize,

    /// Batch timeout (e.g. "1s", "250ms")
    #[arg(
        short = 't',
        long,
        env = "LOAD_PRODUCER_BATCH_TIMEOUT",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub batch_timeout: Duration,

    /// Messages per second
    #[arg(long = "mps", env = "LOAD_PRODUCER_MPS", default_value_t = 500)]
    pub messages_per_second: u32,

    /// Asynchronous writing
    #[arg(short = 'a', long = "async", env = "LOAD_PRODUCER_ASYNC")]
    pub async_mode: bool,

    /// Producer backend
    #[arg(
        short = 'l',
        long = "lib",
        env = "LOAD_PRODUCER_LIB",
        value_enum,
        default_value_t = BackendKind::Batching
    )]
    pub backend: BackendKind,

    /// Kafka broker address
    #[arg(short = 'b', long = "broker", env = "KAFKA_BROKERS", default_value = "127.0.0.1:29092")]
    pub broker: String,

    /// Topic to publish to
    #[arg(long, env = "LOAD_PRODUCER_TOPIC", default_value = "test-topic")]
    pub topic: String,

    /// How long to wait for broker metadata at startup
    #[arg(
        long,
        env = "LOAD_PRODUCER_CONNECT_TIMEOUT",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub connect_timeout: Duration,
}

/// Settings resolved once at startup and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendKind,
    pub messages_per_second: u32,
    pub producer: ProducerConfig,
}

impl TryFrom<Cli> for Settings {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> anyhow::Result<Self> {
        if cli.messages_per_second == 0 {
            anyhow::bail!("--mps must be at least 1");
        }

        let producer = ProducerConfig {
            brokers: cli.broker,
            topic: cli.topic,
            batch_size: cli.batch_size,
            batch_timeout: cli.batch_timeout,
            async_mode: cli.async_mode,
            connect_timeout: cli.connect_timeout,
            ..Default::default()
        };
        producer
            .validate()
            .context("Invalid producer settings")?;

        Ok(Self {
            backend: cli.backend,
            messages_per_second: cli.messages_per_second,
            producer,
        })
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages/sec = {}\tbatchSize = {}\tbatchTimeout = {:?}",
            self.messages_per_second, self.producer.batch_size, self.producer.batch_timeout
        )
    }
}
