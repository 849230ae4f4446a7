use std::time::Duration;

use async_trait::async_trait;
use booking_core::{DedupStore, DedupStoreError};
use redis::AsyncCommands;

use crate::RedisHandle;

/// 5-minute TTL on dedup markers (§3 "Dedup Marker", §6).
const DEDUP_TTL: Duration = Duration::from_secs(5 * 60);

/// Redis-backed implementation of the C8 dedup marker store. Key layout:
/// `applied:<key>` (§6), where `key` is the caller-supplied RF or
/// cancel-derived identifier.
pub struct RedisDedupStore {
    handle: RedisHandle,
}

impl RedisDedupStore {
    /// Wrap a connected [`RedisHandle`].
    #[must_use]
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn key(key: &str) -> String {
        format!("applied:{key}")
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn exists(&self, key: &str) -> Result<bool, DedupStoreError> {
        let mut conn = self.handle.connection();
        conn.exists(Self::key(key))
            .await
            .map_err(|e| DedupStoreError::Transport(e.to_string()))
    }

    async fn mark_applied(&self, key: &str) -> Result<(), DedupStoreError> {
        let mut conn = self.handle.connection();
        let _: () = conn
            .set_ex(Self::key(key), "processed", DEDUP_TTL.as_secs())
            .await
            .map_err(|e| DedupStoreError::Transport(e.to_string()))?;
        Ok(())
    }
}
