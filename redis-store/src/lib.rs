//! Redis-backed implementations of the fast-store ports defined in
//! `booking-core`: the seat counter (C1), request state store (C2), dedup
//! marker store (C8), and price cache.
//!
//! All multi-step mutations are expressed as single Lua scripts executed
//! server-side via [`redis::Script`], the same discipline the source uses
//! (`decrSeatsScript`, `casStateScript`) so that concurrent workers racing
//! on the same key never observe a half-applied mutation (§9 "do not
//! introduce locks; express multi-step mutations as server-side scripts").

mod dedup;
mod price_cache;
mod request_state;
mod seat_counter;

pub use dedup::RedisDedupStore;
pub use price_cache::RedisPriceCache;
pub use request_state::RedisRequestStateStore;
pub use seat_counter::RedisSeatCounter;

use redis::aio::ConnectionManager;
use thiserror::Error;

/// Errors establishing a Redis connection.
#[derive(Error, Debug)]
pub enum RedisStoreError {
    /// The client could not be constructed from the given URL.
    #[error("invalid redis url: {0}")]
    InvalidUrl(#[source] redis::RedisError),
    /// The initial connection could not be established.
    #[error("redis connection failed: {0}")]
    ConnectionFailed(#[source] redis::RedisError),
}

/// A cloneable, reconnecting Redis connection handle shared by every port
/// implementation in this crate. `ConnectionManager` automatically
/// reconnects on transport failure, matching the always-retry posture
/// `§5` expects from store clients.
#[derive(Clone)]
pub struct RedisHandle {
    conn: ConnectionManager,
}

impl RedisHandle {
    /// Connect to `url`, returning a handle usable from any number of
    /// cloned store wrappers.
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] if the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisStoreError> {
        let client = redis::Client::open(url).map_err(RedisStoreError::InvalidUrl)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(RedisStoreError::ConnectionFailed)?;
        Ok(Self { conn })
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}
