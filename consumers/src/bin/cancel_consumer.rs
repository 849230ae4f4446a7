//! Cancel Consumer binary (C7): drives the `cancel.requests` compensation
//! pipeline.

use std::sync::Arc;
use std::time::Duration;

use booking_bus::KafkaMessageBus;
use booking_consumers::cancel::CancelConsumer;
use booking_consumers::{Config, ConsumerRunner};
use booking_core::bus::topics;
use booking_postgres::{DeadLetterQueue, PostgresBookingStore};
use booking_redis::{RedisHandle, RedisRequestStateStore, RedisSeatCounter};
use booking_runtime::metrics::MetricsServer;
use booking_runtime::{CircuitBreaker, RetryPolicy};
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booking_consumers=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        postgres = %config.postgres.url,
        redis = %config.redis.url,
        brokers = %config.bus.brokers,
        "cancel-consumer configuration loaded"
    );

    let mut metrics_server = MetricsServer::new(config.metrics.addr);
    metrics_server
        .start()
        .map_err(|e| format!("failed to start metrics server: {e}"))?;

    let pool = booking_postgres::connect(&config.postgres.url, config.postgres.max_connections).await?;
    let redis = RedisHandle::connect(&config.redis.url).await?;
    let bus = Arc::new(KafkaMessageBus::connect(
        &config.bus.brokers,
        Duration::from_millis(config.bus.send_timeout_ms),
    )?);

    let seat_counter = Arc::new(RedisSeatCounter::new(redis.clone()));
    let request_state = Arc::new(RedisRequestStateStore::new(redis.clone()));
    let booking_store = Arc::new(PostgresBookingStore::new(pool.clone()));
    let dlq = Arc::new(DeadLetterQueue::new(pool));

    let retry = RetryPolicy::new().with_max_attempts(config.resilience.max_retry_attempts);
    let breaker = CircuitBreaker::new()
        .with_failure_threshold(config.resilience.circuit_failure_threshold)
        .with_timeout(Duration::from_secs(config.resilience.circuit_timeout_secs));

    let handler = Arc::new(CancelConsumer::new(
        seat_counter,
        request_state,
        booking_store,
        bus.clone(),
        Some(dlq),
        retry,
        breaker,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(16);

    let runner = ConsumerRunner::new(
        "cancel-consumer",
        topics::CANCEL_REQUESTS,
        config.bus.cancel_consumer_group.clone(),
        bus,
        handler,
        shutdown_rx,
    );
    let join_handle = runner.spawn();

    tracing::info!("cancel-consumer running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    let _ = shutdown_tx.send(());
    let _ = join_handle.await;

    Ok(())
}
