use clap::Parser;
use kafka_load_producer::{Cli, Settings};
use load_producer_kafka::{Acks, BackendKind};
use std::time::Duration;

#[test]
fn test_defaults() {
    let cli = Cli::try_parse_from(["kafka-load-producer"]).unwrap();

    assert_eq!(cli.batch_size, 50);
    assert_eq!(cli.batch_timeout, Duration::from_secs(1));
    assert_eq!(cli.messages_per_second, 500);
    assert!(!cli.async_mode);
    assert_eq!(cli.backend, BackendKind::Batching);
    assert_eq!(cli.broker, "127.0.0.1:29092");
    assert_eq!(cli.topic, "test-topic");
}

#[test]
fn test_short_flags() {
    let cli = Cli::try_parse_from([
        "kafka-load-producer",
        "-s",
        "10",
        "-t",
        "250ms",
        "--mps",
        "100",
        "-a",
        "-l",
        "threaded",
        "-b",
        "kafka:9092",
    ])
    .unwrap();
    let settings = Settings::try_from(cli).unwrap();

    assert_eq!(settings.backend, BackendKind::Threaded);
    assert_eq!(settings.messages_per_second, 100);
    assert_eq!(settings.producer.batch_size, 10);
    assert_eq!(settings.producer.batch_timeout, Duration::from_millis(250));
    assert_eq!(settings.producer.brokers, "kafka:9092");
    assert_eq!(settings.producer.acks(), Acks::None);
}

#[test]
fn test_settings_banner() {
    let cli = Cli::try_parse_from(["kafka-load-producer"]).unwrap();
    let settings = Settings::try_from(cli).unwrap();

    assert_eq!(
        settings.to_string(),
        "messages/sec = 500\tbatchSize = 50\tbatchTimeout = 1s"
    );
}

#[test]
fn test_rejects_invalid_values() {
    assert!(Cli::try_parse_from(["kafka-load-producer", "-l", "sarama"]).is_err());
    assert!(Cli::try_parse_from(["kafka-load-producer", "-t", "soon"]).is_err());

    let zero_rate = Cli::try_parse_from(["kafka-load-producer", "--mps", "0"]).unwrap();
    assert!(Settings::try_from(zero_rate).is_err());

    let zero_batch = Cli::try_parse_from(["kafka-load-producer", "-s", "0"]).unwrap();
    assert!(Settings::try_from(zero_batch).is_err());
}

#[tokio::test]
async fn test_unreachable_broker_fails_before_sending() {
    let cli = Cli::try_parse_from([
        "kafka-load-producer",
        "-b",
        "127.0.0.1:9",
        "--connect-timeout",
        "2s",
        "-l",
        "future",
    ])
    .unwrap();
    let settings = Settings::try_from(cli).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(30),
        kafka_load_producer::run(settings),
    )
    .await
    .expect("startup should fail instead of entering the send loop");

    let err = result.unwrap_err();
    assert!(
        format!("{err:#}").contains("Failed to create 'future' backend"),
        "unexpected error: {err:#}"
    );
}
