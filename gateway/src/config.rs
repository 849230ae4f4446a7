//! Configuration for the intent gateway binary, loaded from environment
//! variables (§4.6), following the same `Config::from_env()` shape as
//! `booking-consumers::Config`.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Top-level gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Kafka/Redpanda bus settings.
    pub bus: BusConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Kafka/Redpanda bus settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Comma-separated bootstrap broker addresses.
    pub brokers: String,
    /// Producer send timeout.
    pub send_timeout: Duration,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// local-development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bus: BusConfig {
                brokers: env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
                send_timeout: Duration::from_millis(
                    env::var("KAFKA_SEND_TIMEOUT_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(5000),
                ),
            },
            server: ServerConfig {
                addr: env::var("GATEWAY_ADDR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))),
            },
        }
    }
}
