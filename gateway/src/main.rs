//! Intent Gateway binary (C9): a thin HTTP-to-bus adapter in front of
//! `bookings.requests` and `cancel.requests`.

use std::sync::Arc;

use booking_bus::KafkaMessageBus;
use booking_gateway::{build_router, AppState, Config};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booking_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(brokers = %config.bus.brokers, addr = %config.server.addr, "gateway configuration loaded");

    let bus = Arc::new(KafkaMessageBus::connect(&config.bus.brokers, config.bus.send_timeout)?);
    let state = AppState::new(bus);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.addr).await?;
    tracing::info!(addr = %config.server.addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
