use std::time::Duration;

use async_trait::async_trait;
use booking_core::{RequestFingerprint, RequestState, RequestStateError, RequestStateStore};
use redis::AsyncCommands;

use crate::RedisHandle;

/// `CompareAndAdvance` (§4.2): if the current value is `cancelled`, leave it
/// untouched and return `"cancelled"`; otherwise `SET key next EX ttl` and
/// return the prior value (empty string if absent). Ported verbatim from the
/// source's `casStateScript`.
const COMPARE_AND_ADVANCE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == "cancelled" then
    return "cancelled"
else
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
    return current
end
"#;

/// Redis-backed implementation of the request lifecycle label store (C2,
/// §4.2). Key layout: `reqstate:<RF>` (§6).
pub struct RedisRequestStateStore {
    handle: RedisHandle,
}

impl RedisRequestStateStore {
    /// Wrap a connected [`RedisHandle`].
    #[must_use]
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn key(rf: &RequestFingerprint) -> String {
        format!("reqstate:{rf}")
    }
}

#[async_trait]
impl RequestStateStore for RedisRequestStateStore {
    async fn get(
        &self,
        rf: &RequestFingerprint,
    ) -> Result<Option<RequestState>, RequestStateError> {
        let mut conn = self.handle.connection();
        let raw: Option<String> = conn
            .get(Self::key(rf))
            .await
            .map_err(|e| RequestStateError::Transport(e.to_string()))?;
        Ok(raw.and_then(|s| RequestState::parse(&s)))
    }

    async fn set(
        &self,
        rf: &RequestFingerprint,
        label: RequestState,
        ttl: Option<Duration>,
    ) -> Result<(), RequestStateError> {
        let mut conn = self.handle.connection();
        let key = Self::key(rf);
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, label.as_str(), ttl.as_secs())
                    .await
                    .map_err(|e| RequestStateError::Transport(e.to_string()))?;
            }
            None => {
                let _: () = conn
                    .set(key, label.as_str())
                    .await
                    .map_err(|e| RequestStateError::Transport(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn compare_and_advance(
        &self,
        rf: &RequestFingerprint,
        next: RequestState,
        ttl: Duration,
    ) -> Result<Option<RequestState>, RequestStateError> {
        let script = redis::Script::new(COMPARE_AND_ADVANCE_SCRIPT);
        let mut conn = self.handle.connection();
        let prior: String = script
            .key(Self::key(rf))
            .arg(next.as_str())
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RequestStateError::Transport(e.to_string()))?;

        Ok(if prior.is_empty() {
            None
        } else {
            RequestState::parse(&prior)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_spec() {
        let rf = RequestFingerprint::new("r1");
        assert_eq!(RedisRequestStateStore::key(&rf), "reqstate:r1");
    }
}
