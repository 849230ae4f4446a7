//! The Booking Consumer (C6, §4.3): drives the `s1 -> s2 -> s3` state
//! machine for a booking intent, falling through from one stage straight
//! into the next within the same message-processing call, and stopping the
//! instant it observes a sticky `cancelled` label.

use std::sync::Arc;

use async_trait::async_trait;
use booking_core::state::{CANCELLED_TTL, STATE_TTL};
use booking_core::{
    BookingId, BookingIntent, BookingRecord, BookingStatus, BookingStore, BookingStoreError,
    BusError, DecrementOutcome, DeltaOperation, InventoryDelta, MessageBus, PriceCache,
    RequestState, RequestStateError, RequestStateStore, SeatCounter, SeatCounterError,
};
use booking_postgres::DeadLetterQueue;
use booking_runtime::{CircuitBreaker, RetryPolicy};
use chrono::Utc;

use crate::outcome::ProcessingOutcome;
use crate::resilience::call_with_resilience;
use crate::runner::MessageHandler;

/// Handler for `bookings.requests` (C6).
pub struct BookingConsumer {
    seat_counter: Arc<dyn SeatCounter>,
    request_state: Arc<dyn RequestStateStore>,
    booking_store: Arc<dyn BookingStore>,
    price_cache: Arc<dyn PriceCache>,
    bus: Arc<dyn MessageBus>,
    dlq: Option<Arc<DeadLetterQueue>>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl BookingConsumer {
    /// Construct a handler wired to its store/bus ports.
    #[must_use]
    pub fn new(
        seat_counter: Arc<dyn SeatCounter>,
        request_state: Arc<dyn RequestStateStore>,
        booking_store: Arc<dyn BookingStore>,
        price_cache: Arc<dyn PriceCache>,
        bus: Arc<dyn MessageBus>,
        dlq: Option<Arc<DeadLetterQueue>>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            seat_counter,
            request_state,
            booking_store,
            price_cache,
            bus,
            dlq,
            retry,
            breaker,
        }
    }

    async fn resolve_price(&self, intent: &BookingIntent) -> f64 {
        if let Some(price) = intent.price {
            return price;
        }
        match self.price_cache.get(&intent.event_id).await {
            Ok(price) => price.unwrap_or(0.0),
            Err(e) => {
                tracing::warn!(event_id = %intent.event_id, error = %e, "price cache unreachable, booking recorded with price 0");
                0.0
            }
        }
    }

    /// `unit_price` is the per-seat price resolved by [`Self::resolve_price`];
    /// the stored `price` is the total for all seats (unit price × seat
    /// count), matching the source's `insertBooking`
    /// (`Price: price * float64(req.Seats)`).
    fn record(&self, intent: &BookingIntent, unit_price: f64, status: BookingStatus) -> BookingRecord {
        let now = Utc::now();
        BookingRecord {
            id: BookingId::generate(),
            request_fingerprint: intent.request_fingerprint.clone(),
            user_id: intent.user_id.clone(),
            event_id: intent.event_id.clone(),
            price: unit_price * f64::from(intent.seats),
            seats: intent.seats,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    async fn insert_record(&self, record: &BookingRecord) -> Result<bool, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "booking_store.insert_if_absent",
            || BookingStoreError::Transport("circuit breaker open".to_string()),
            || self.booking_store.insert_if_absent(record),
        )
        .await
        .map_err(|_| ())
    }

    async fn try_decrement(&self, intent: &BookingIntent) -> Result<DecrementOutcome, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "seat_counter.try_decrement",
            || SeatCounterError::Transport("circuit breaker open".to_string()),
            || self.seat_counter.try_decrement(&intent.event_id, intent.seats),
        )
        .await
        .map_err(|_| ())
    }

    async fn increment(&self, intent: &BookingIntent) {
        let result = call_with_resilience(
            &self.breaker,
            &self.retry,
            "seat_counter.increment",
            || SeatCounterError::Transport("circuit breaker open".to_string()),
            || self.seat_counter.increment(&intent.event_id, intent.seats),
        )
        .await;
        if let Err(()) = result {
            tracing::error!(event_id = %intent.event_id, seats = intent.seats, "seat counter rollback failed after retries");
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

    async fn advance(
        &self,
        rf: &booking_core::RequestFingerprint,
        next: RequestState,
    ) -> Result<Option<RequestState>, ()> {
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "request_state.compare_and_advance",
            || RequestStateError::Transport("circuit breaker open".to_string()),
            || self.request_state.compare_and_advance(rf, next, STATE_TTL),
        )
        .await
        .map_err(|_| ())
    }

    async fn publish_subtract_delta(&self, intent: &BookingIntent) -> Result<(), ()> {
        let delta = InventoryDelta {
            event_id: intent.event_id.clone(),
            seats: intent.seats,
            operation: DeltaOperation::Subtract,
        };
        let payload = match serde_json::to_vec(&delta) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize inventory delta");
                return Err(());
            }
        };
        call_with_resilience(
            &self.breaker,
            &self.retry,
            "bus.publish",
            || BusError::Transport("circuit breaker open".to_string()),
            || {
                self.bus.publish(
                    booking_core::bus::topics::SEATS_UPDATES,
                    intent.request_fingerprint.as_str(),
                    &payload,
                )
            },
        )
        .await
        .map_err(|_| ())
    }

    async fn run_s1(&self, intent: &BookingIntent) -> ProcessingOutcome {
        let decrement = match self.try_decrement(intent).await {
            Ok(outcome) => outcome,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        match decrement {
            DecrementOutcome::Insufficient | DecrementOutcome::Unknown => {
                let record = self.record(intent, self.resolve_price(intent).await, BookingStatus::Failed);
                if self.insert_record(&record).await.is_err() {
                    return ProcessingOutcome::LeaveUncommitted;
                }
                if self
                    .set_label(&intent.request_fingerprint, RequestState::Failed, Some(STATE_TTL))
                    .await
                    .is_err()
                {
                    return ProcessingOutcome::LeaveUncommitted;
                }
                tracing::info!(request_id = %intent.request_fingerprint, "booking failed: insufficient seats");
                ProcessingOutcome::Commit
            }
            DecrementOutcome::Ok => {
                let prior = match self.advance(&intent.request_fingerprint, RequestState::S2).await {
                    Ok(prior) => prior,
                    Err(()) => return ProcessingOutcome::LeaveUncommitted,
                };

                if prior == Some(RequestState::Cancelled) {
                    let record = self.record(intent, self.resolve_price(intent).await, BookingStatus::Cancelled);
                    if self.insert_record(&record).await.is_err() {
                        return ProcessingOutcome::LeaveUncommitted;
                    }
                    self.increment(intent).await;
                    tracing::info!(request_id = %intent.request_fingerprint, "booking cancelled during seat reservation");
                    return ProcessingOutcome::Commit;
                }

                self.run_s2(intent).await
            }
        }
    }

    async fn run_s2(&self, intent: &BookingIntent) -> ProcessingOutcome {
        let current = match self.get_label(&intent.request_fingerprint).await {
            Ok(label) => label,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        if current == Some(RequestState::Cancelled) {
            self.increment(intent).await;
            if self
                .set_label(&intent.request_fingerprint, RequestState::Cancelled, CANCELLED_TTL)
                .await
                .is_err()
            {
                return ProcessingOutcome::LeaveUncommitted;
            }
            tracing::info!(request_id = %intent.request_fingerprint, "booking cancelled before persistence");
            return ProcessingOutcome::Commit;
        }

        let record = self.record(intent, self.resolve_price(intent).await, BookingStatus::Confirmed);
        if self.insert_record(&record).await.is_err() {
            return ProcessingOutcome::LeaveUncommitted;
        }

        let prior = match self.advance(&intent.request_fingerprint, RequestState::S3).await {
            Ok(prior) => prior,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        if prior == Some(RequestState::Cancelled) {
            if call_with_resilience(
                &self.breaker,
                &self.retry,
                "booking_store.update_status_by_fingerprint",
                || BookingStoreError::Transport("circuit breaker open".to_string()),
                || {
                    self.booking_store
                        .update_status_by_fingerprint(&intent.request_fingerprint, BookingStatus::Cancelled)
                },
            )
            .await
            .is_err()
            {
                return ProcessingOutcome::LeaveUncommitted;
            }
            self.increment(intent).await;
            tracing::info!(request_id = %intent.request_fingerprint, "booking cancelled during persistence");
            return ProcessingOutcome::Commit;
        }

        self.run_s3(intent).await
    }

    async fn run_s3(&self, intent: &BookingIntent) -> ProcessingOutcome {
        let current = match self.get_label(&intent.request_fingerprint).await {
            Ok(label) => label,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        if current == Some(RequestState::Cancelled) {
            if call_with_resilience(
                &self.breaker,
                &self.retry,
                "booking_store.update_status_by_fingerprint",
                || BookingStoreError::Transport("circuit breaker open".to_string()),
                || {
                    self.booking_store
                        .update_status_by_fingerprint(&intent.request_fingerprint, BookingStatus::Cancelled)
                },
            )
            .await
            .is_err()
            {
                return ProcessingOutcome::LeaveUncommitted;
            }
            self.increment(intent).await;
            if self
                .set_label(&intent.request_fingerprint, RequestState::Cancelled, CANCELLED_TTL)
                .await
                .is_err()
            {
                return ProcessingOutcome::LeaveUncommitted;
            }
            tracing::info!(request_id = %intent.request_fingerprint, "booking cancelled during inventory propagation");
            return ProcessingOutcome::Commit;
        }

        if self.publish_subtract_delta(intent).await.is_err() {
            return ProcessingOutcome::LeaveUncommitted;
        }

        if self
            .set_label(&intent.request_fingerprint, RequestState::Success, Some(STATE_TTL))
            .await
            .is_err()
        {
            return ProcessingOutcome::LeaveUncommitted;
        }

        tracing::info!(request_id = %intent.request_fingerprint, "booking confirmed");
        ProcessingOutcome::Commit
    }

    /// §4.3 s1.1: a booking message can arrive after the cancel consumer has
    /// already written the sticky `cancelled` label (scenario S3 — cancel
    /// before the booking intent). Insert the booking record as cancelled so
    /// C3 carries a row for this RF even though no seats were ever
    /// reserved; idempotent via `insert_if_absent`, so this is also a safe
    /// no-op on redelivery once an inflight rollback (run_s1/s2/s3) has
    /// already inserted the cancelled row itself.
    async fn handle_cancelled_on_arrival(&self, intent: &BookingIntent) -> ProcessingOutcome {
        let record = self.record(intent, self.resolve_price(intent).await, BookingStatus::Cancelled);
        if self.insert_record(&record).await.is_err() {
            return ProcessingOutcome::LeaveUncommitted;
        }
        tracing::debug!(request_id = %intent.request_fingerprint, "booking intent observed cancelled on arrival");
        ProcessingOutcome::Commit
    }

    async fn handle_malformed(&self, key: &str, payload: &[u8], reason: &str) -> ProcessingOutcome {
        tracing::warn!(key, reason, "malformed booking intent, dropping");
        if let Some(dlq) = &self.dlq {
            if let Err(e) = dlq
                .add_entry(booking_core::bus::topics::BOOKINGS_REQUESTS, Some(key), payload, reason, 0)
                .await
            {
                tracing::warn!(error = %e, "failed to record malformed booking intent in dead letter queue");
            }
        }
        ProcessingOutcome::Commit
    }
}

#[async_trait]
impl MessageHandler for BookingConsumer {
    async fn handle(&self, key: &str, payload: &[u8]) -> ProcessingOutcome {
        let intent: BookingIntent = match serde_json::from_slice(payload) {
            Ok(intent) => intent,
            Err(e) => return self.handle_malformed(key, payload, &e.to_string()).await,
        };

        let label = match self.get_label(&intent.request_fingerprint).await {
            Ok(label) => label,
            Err(()) => return ProcessingOutcome::LeaveUncommitted,
        };

        match label.unwrap_or(RequestState::S1) {
            RequestState::Cancelled => self.handle_cancelled_on_arrival(&intent).await,
            RequestState::Failed | RequestState::Success => {
                tracing::debug!(request_id = %intent.request_fingerprint, "booking intent already terminal, no-op");
                ProcessingOutcome::Commit
            }
            RequestState::S1 => self.run_s1(&intent).await,
            RequestState::S2 => self.run_s2(&intent).await,
            RequestState::S3 => self.run_s3(&intent).await,
        }
    }
}
