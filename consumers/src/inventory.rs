//! The Inventory Update Consumer (C8, §4.5): applies an inventory delta to
//! C4 idempotently, keyed by the originating request fingerprint (or
//! cancel-derived key), via the C8 dedup marker.

use std::sync::Arc;

use async_trait::async_trait;
use booking_core::{
    ApplyOutcome, DedupStore, DedupStoreError, InventoryDelta, InventoryStore, InventoryStoreError,
};
use booking_runtime::{CircuitBreaker, RetryPolicy};

use crate::outcome::ProcessingOutcome;
use crate::resilience::call_with_resilience;
use crate::runner::MessageHandler;

/// Handler for `seats.updates` (C8).
pub struct InventoryUpdateConsumer {
    inventory_store: Arc<dyn InventoryStore>,
    dedup: Arc<dyn DedupStore>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl InventoryUpdateConsumer {
    /// Construct a handler wired to its store ports.
    #[must_use]
    pub fn new(
        inventory_store: Arc<dyn InventoryStore>,
        dedup: Arc<dyn DedupStore>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            inventory_store,
            dedup,
            retry,
            breaker,
        }
    }

    async fn already_applied(&self, key: &str) -> Result<bool, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "dedup.exists",
            || DedupStoreError::Transport("circuit breaker open".to_string()),
            || self.dedup.exists(key),
        )
        .await
        .map_err(|_| ())
    }

    async fn mark_applied(&self, key: &str) -> Result<(), ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "dedup.mark_applied",
            || DedupStoreError::Transport("circuit breaker open".to_string()),
            || self.dedup.mark_applied(key),
        )
        .await
        .map_err(|_| ())
    }

    async fn apply_delta(&self, delta: &InventoryDelta) -> Result<ApplyOutcome, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "inventory_store.apply_delta",
            || InventoryStoreError::Transport("circuit breaker open".to_string()),
            || self.inventory_store.apply_delta(&delta.event_id, delta.operation, delta.seats),
        )
        .await
        .map_err(|_| ())
    }

    async fn handle_malformed(&self, key: &str, reason: &str) -> ProcessingOutcome {
        tracing::warn!(key, reason, "malformed inventory delta, dropping");
        ProcessingOutcome::Commit
    }
}

#[async_trait]
impl MessageHandler for InventoryUpdateConsumer {
    async fn handle(&self, key: &str, payload: &[u8]) -> ProcessingOutcome {
        let delta: InventoryDelta = match serde_json::from_slice(payload) {
            Ok(delta) => delta,
            Err(e) => return self.handle_malformed(key, &e.to_string()).await,
        };

        // §4.5 step 1-2: the dedup key is the bus key (the originating RF,
        // or a cancel-derived key for compensating deltas). Presence means
        // this delta was already applied — skip the replay.
        match self.already_applied(key).await {
            Ok(true) => {
                tracing::debug!(key, "inventory delta already applied, skipping replay");
                return ProcessingOutcome::Commit;
            }
            Ok(false) => {}
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        }

        match self.apply_delta(&delta).await {
            Ok(ApplyOutcome::Applied) => {}
            Ok(ApplyOutcome::NoMatch) => {
                // §4.5 step 4: the event was deleted from the catalog; the
                // delta is dropped, not retried.
                tracing::warn!(event_id = %delta.event_id, key, "inventory delta matched no document, dropping");
            }
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        }

        if self.mark_applied(key).await.is_err() {
            return ProcessingOutcome::LeaveUncommitted;
        }

        tracing::info!(key, event_id = %delta.event_id, "inventory delta applied");
        ProcessingOutcome::Commit
    }
}
