use async_trait::async_trait;
use booking_core::{DecrementOutcome, EventId, SeatCounter, SeatCounterError};
use redis::AsyncCommands;

use crate::RedisHandle;

/// `TryDecrement` (§4.1): absent key → `-1` (UNKNOWN); insufficient → `0`;
/// else `DECRBY` and return `1` (OK). Ported verbatim from the source's
/// `decrSeatsScript`.
const TRY_DECREMENT_SCRIPT: &str = r"
local available = redis.call('GET', KEYS[1])
if not available then
    return -1
end
available = tonumber(available)
local required = tonumber(ARGV[1])
if available >= required then
    redis.call('DECRBY', KEYS[1], required)
    return 1
else
    return 0
end
";

/// Redis-backed implementation of the per-event seat counter (C1, §4.1).
/// Key layout: `seats:<event_id>` (§6).
pub struct RedisSeatCounter {
    handle: RedisHandle,
}

impl RedisSeatCounter {
    /// Wrap a connected [`RedisHandle`].
    #[must_use]
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn key(event_id: &EventId) -> String {
        format!("seats:{event_id}")
    }
}

#[async_trait]
impl SeatCounter for RedisSeatCounter {
    async fn try_decrement(
        &self,
        event_id: &EventId,
        n: u32,
    ) -> Result<DecrementOutcome, SeatCounterError> {
        let script = redis::Script::new(TRY_DECREMENT_SCRIPT);
        let mut conn = self.handle.connection();
        let result: i64 = script
            .key(Self::key(event_id))
            .arg(n)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SeatCounterError::Transport(e.to_string()))?;

        Ok(match result {
            1 => DecrementOutcome::Ok,
            0 => DecrementOutcome::Insufficient,
            _ => DecrementOutcome::Unknown,
        })
    }

    async fn increment(&self, event_id: &EventId, n: u32) -> Result<(), SeatCounterError> {
        let mut conn = self.handle.connection();
        let _: i64 = conn
            .incr(Self::key(event_id), i64::from(n))
            .await
            .map_err(|e| SeatCounterError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_spec() {
        let id = EventId::from("E1".to_string());
        assert_eq!(RedisSeatCounter::key(&id), "seats:E1");
    }
}
