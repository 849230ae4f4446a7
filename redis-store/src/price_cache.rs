use async_trait::async_trait;
use booking_core::{EventId, PriceCache, PriceCacheError};
use redis::AsyncCommands;

use crate::RedisHandle;

/// Redis-backed implementation of the price cache. Key layout:
/// `price:<event_id>`, no TTL (§6).
pub struct RedisPriceCache {
    handle: RedisHandle,
}

impl RedisPriceCache {
    /// Wrap a connected [`RedisHandle`].
    #[must_use]
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn key(event_id: &EventId) -> String {
        format!("price:{event_id}")
    }
}

#[async_trait]
impl PriceCache for RedisPriceCache {
    async fn get(&self, event_id: &EventId) -> Result<Option<f64>, PriceCacheError> {
        let mut conn = self.handle.connection();
        let raw: Option<String> = conn
            .get(Self::key(event_id))
            .await
            .map_err(|e| PriceCacheError::Transport(e.to_string()))?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}
