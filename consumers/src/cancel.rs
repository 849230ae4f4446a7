//! The Cancel Consumer (C7, §4.4): interprets a cancellation intent as
//! either an RF-keyed or DB-keyed cancel, writes the sticky `cancelled`
//! label, and — except for the inflight case, where C6 owns the rollback —
//! performs the compensating DB update and seat-counter/inventory rollback
//! itself.

use std::sync::Arc;

use async_trait::async_trait;
use booking_core::state::CANCELLED_TTL;
use booking_core::{
    BookingStatus, BookingStore, BookingStoreError, BusError, CancellationIntent, DeltaOperation,
    InventoryDelta, MessageBus, RequestState, RequestStateError, RequestStateStore, SeatCounter,
    SeatCounterError,
};
use booking_postgres::DeadLetterQueue;
use booking_runtime::{CircuitBreaker, RetryPolicy};

use crate::outcome::ProcessingOutcome;
use crate::resilience::call_with_resilience;
use crate::runner::MessageHandler;

/// Handler for `cancel.requests` (C7).
pub struct CancelConsumer {
    seat_counter: Arc<dyn SeatCounter>,
    request_state: Arc<dyn RequestStateStore>,
    booking_store: Arc<dyn BookingStore>,
    bus: Arc<dyn MessageBus>,
    dlq: Option<Arc<DeadLetterQueue>>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl CancelConsumer {
    /// Construct a handler wired to its store/bus ports.
    #[must_use]
    pub fn new(
        seat_counter: Arc<dyn SeatCounter>,
        request_state: Arc<dyn RequestStateStore>,
        booking_store: Arc<dyn BookingStore>,
        bus: Arc<dyn MessageBus>,
        dlq: Option<Arc<DeadLetterQueue>>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            seat_counter,
            request_state,
            booking_store,
            bus,
            dlq,
            retry,
            breaker,
        }
    }

    async fn get_label(&self, rf: &booking_core::RequestFingerprint) -> Result<Option<RequestState>, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "request_state.get",
            || RequestStateError::Transport("circuit breaker open".to_string()),
            || self.request_state.get(rf),
        )
        .await
        .map_err(|_| ())
    }

    async fn set_label(
        &self,
        rf: &booking_core::RequestFingerprint,
        label: RequestState,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "request_state.set",
            || RequestStateError::Transport("circuit breaker open".to_string()),
            || self.request_state.set(rf, label, ttl),
        )
        .await
        .map_err(|_| ())
    }

    async fn update_status_by_fingerprint(&self, rf: &booking_core::RequestFingerprint) -> Result<bool, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "booking_store.update_status_by_fingerprint",
            || BookingStoreError::Transport("circuit breaker open".to_string()),
            || self.booking_store.update_status_by_fingerprint(rf, BookingStatus::Cancelled),
        )
        .await
        .map_err(|_| ())
    }

    async fn update_status_by_booking_id(&self, booking_id: &str) -> Result<bool, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "booking_store.update_status_by_booking_id",
            || BookingStoreError::Transport("circuit breaker open".to_string()),
            || self.booking_store.update_status_by_booking_id(booking_id, BookingStatus::Cancelled),
        )
        .await
        .map_err(|_| ())
    }

    async fn increment(&self, event_id: &booking_core::EventId, seats: u32) -> Result<(), ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "seat_counter.increment",
            || SeatCounterError::Transport("circuit breaker open".to_string()),
            || self.seat_counter.increment(event_id, seats),
        )
        .await
        .map_err(|_| ())
    }

    async fn publish_add_delta(
        &self,
        event_id: &booking_core::EventId,
        seats: u32,
        key: &str,
    ) -> Result<(), ()> {
        let delta = InventoryDelta {
            event_id: event_id.clone(),
            seats,
            operation: DeltaOperation::Add,
        };
        let payload = match serde_json::to_vec(&delta) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize compensating inventory delta");
                return Err(());
            }
        };
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "bus.publish",
            || BusError::Transport("circuit breaker open".to_string()),
            || self.bus.publish(booking_core::bus::topics::SEATS_UPDATES, key, &payload),
        )
        .await
        .map_err(|_| ())
    }

    /// §4.4 "DB-keyed path": mark the booking record cancelled, and only if
    /// the update actually matched a row (seats were genuinely reserved for
    /// this booking) and `seats > 0`, publish a compensating `add` delta and
    /// roll back the seat counter. A cancel that races ahead of the booking
    /// consumer — nothing in C3 yet to match — must not fabricate a
    /// compensation for a reservation that never happened; the booking
    /// consumer's own `s1.1` handling inserts the cancelled row once its
    /// message eventually arrives.
    async fn compensate(
        &self,
        intent: &CancellationIntent,
        key: &str,
        by_booking_id: Option<&str>,
    ) -> ProcessingOutcome {
        let matched = if let Some(booking_id) = by_booking_id {
            self.update_status_by_booking_id(booking_id).await
        } else if let Some(rf) = &intent.request_fingerprint {
            self.update_status_by_fingerprint(rf).await
        } else {
            Ok(false)
        };

        let matched = match matched {
            Ok(matched) => matched,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        if matched && intent.seats > 0 {
            if self.publish_add_delta(&intent.event_id, intent.seats, key).await.is_err() {
                return ProcessingOutcome::LeaveUncommitted;
            }
            if self.increment(&intent.event_id, intent.seats).await.is_err() {
                return ProcessingOutcome::LeaveUncommitted;
            }
        }

        ProcessingOutcome::Commit
    }

    async fn handle_malformed(&self, key: &str, payload: &[u8], reason: &str) -> ProcessingOutcome {
        tracing::warn!(key, reason, "malformed cancellation intent, dropping");
        if let Some(dlq) = &self.dlq {
            if let Err(e) = dlq
                .add_entry(booking_core::bus::topics::CANCEL_REQUESTS, Some(key), payload, reason, 0)
                .await
            {
                tracing::warn!(error = %e, "failed to record malformed cancellation intent in dead letter queue");
            }
        }
        ProcessingOutcome::Commit
    }
}

#[async_trait]
impl MessageHandler for CancelConsumer {
    async fn handle(&self, key: &str, payload: &[u8]) -> ProcessingOutcome {
        let intent: CancellationIntent = match serde_json::from_slice(payload) {
            Ok(intent) => intent,
            Err(e) => return self.handle_malformed(key, payload, &e.to_string()).await,
        };

        if intent.is_malformed() {
            return self
                .handle_malformed(key, payload, "neither request_fingerprint nor booking_id present")
                .await;
        }

        // DB-keyed cancel: no RF to check against C2 at all, go straight to
        // the DB-keyed compensation path (§4.4).
        let Some(rf) = &intent.request_fingerprint else {
            let booking_id = intent.booking_id.as_deref();
            return self.compensate(&intent, key, booking_id).await;
        };

        let label = match self.get_label(rf).await {
            Ok(label) => label,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        match label {
            None => {
                // Absent: covers the race where the booking-side message
                // hasn't been consumed yet. Mark cancelled with a long TTL
                // so the late booking worker observes it, then proceed to
                // DB cancellation.
                if self.set_label(rf, RequestState::Cancelled, CANCELLED_TTL).await.is_err() {
                    return ProcessingOutcome::LeaveUncommitted;
                }
                self.compensate(&intent, key, None).await
            }
            Some(state) if state.is_inflight() => {
                // C6 still owns the seat reservation; it will observe the
                // sticky label on its next CompareAndAdvance and roll back
                // itself. Touching C1/C3 here would double-rollback.
                if self.set_label(rf, RequestState::Cancelled, CANCELLED_TTL).await.is_err() {
                    return ProcessingOutcome::LeaveUncommitted;
                }
                tracing::info!(request_id = %rf, "cancellation recorded while booking inflight");
                ProcessingOutcome::Commit
            }
            Some(RequestState::Success) => {
                // C6 already emitted a subtract delta; a compensating add
                // is required.
                if self.set_label(rf, RequestState::Cancelled, CANCELLED_TTL).await.is_err() {
                    return ProcessingOutcome::LeaveUncommitted;
                }
                self.compensate(&intent, key, None).await
            }
            Some(RequestState::Failed | RequestState::Cancelled) => {
                tracing::debug!(request_id = %rf, "cancellation intent for terminal request, no-op");
                ProcessingOutcome::Commit
            }
        }
    }
}
