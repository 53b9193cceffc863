//! Command-line interface for kafka-load-producer
//!
//! # Usage Examples
//!
//! ```bash
//! # Defaults: batching backend, 500 messages/s, batch size 50, batch timeout 1s
//! kafka-load-producer
//!
//! # Synchronous FutureProducer against a remote broker
//! kafka-load-producer -l future -b kafka:9092 --mps 1000
//!
//! # Print every option with its default
//! kafka-load-producer -h
//! ```
//!
//! Set `RUST_LOG` to change verbosity (default `info`).

use clap::Parser;
use kafka_load_producer::{Cli, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::try_from(cli)?;

    kafka_load_producer::run(settings).await
}
