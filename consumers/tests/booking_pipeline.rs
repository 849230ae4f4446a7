//! End-to-end scenarios for the booking/cancel/inventory pipeline (§8),
//! driving `MessageHandler::handle` directly against the in-memory fakes —
//! no real Redis/Postgres/Kafka needed.

#![allow(clippy::unwrap_used)]

mod fakes;

use std::sync::Arc;

use booking_consumers::{BookingConsumer, CancelConsumer, InventoryUpdateConsumer, MessageHandler, ProcessingOutcome};
use booking_core::state::RequestState;
use booking_core::{BookingIntent, BookingStatus, CancellationIntent, DeltaOperation, EventId, InventoryDelta, RequestFingerprint, UserId};
use booking_runtime::{CircuitBreaker, RetryPolicy};

use fakes::{FakeBookingStore, FakeBus, FakeDedupStore, FakeInventoryStore, FakePriceCache, FakeRequestStateStore, FakeSeatCounter};

fn retry() -> RetryPolicy {
    RetryPolicy::new().with_max_attempts(1)
}

fn breaker() -> CircuitBreaker {
    CircuitBreaker::new()
}

fn booking_intent(request_id: &str, event_id: &str, seats: u32) -> BookingIntent {
    BookingIntent {
        request_fingerprint: RequestFingerprint::new(request_id),
        event_id: EventId::new(event_id),
        user_id: UserId::new("u1"),
        seats,
        price: None,
    }
}

struct Harness {
    seat_counter: Arc<FakeSeatCounter>,
    request_state: Arc<FakeRequestStateStore>,
    booking_store: Arc<FakeBookingStore>,
    bus: Arc<FakeBus>,
    consumer: BookingConsumer,
}

fn harness(event_id: &str, seats: i64) -> Harness {
    let seat_counter = Arc::new(FakeSeatCounter::with_seats(event_id, seats));
    let request_state = Arc::new(FakeRequestStateStore::default());
    let booking_store = Arc::new(FakeBookingStore::default());
    let price_cache = Arc::new(FakePriceCache::with_price(9.5));
    let bus = Arc::new(FakeBus::default());

    let consumer = BookingConsumer::new(
        seat_counter.clone(),
        request_state.clone(),
        booking_store.clone(),
        price_cache,
        bus.clone(),
        None,
        retry(),
        breaker(),
    );

    Harness {
        seat_counter,
        request_state,
        booking_store,
        bus,
        consumer,
    }
}

/// S1: happy path. Seats are sufficient, the booking is confirmed, a single
/// `subtract` delta reaches `seats.updates`, and feeding that delta into the
/// inventory consumer decrements the catalog's seat count exactly once.
#[tokio::test]
async fn happy_path_confirms_and_propagates_one_delta() {
    let h = harness("E1", 10);
    let intent = booking_intent("r1", "E1", 3);
    let payload = serde_json::to_vec(&intent).unwrap();

    let outcome = h.consumer.handle(intent.request_fingerprint.as_str(), &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(7));

    let record = h.booking_store.get(&intent.request_fingerprint).expect("record persisted");
    assert_eq!(record.status, BookingStatus::Confirmed);
    assert_eq!(record.seats, 3);

    assert_eq!(
        h.request_state.get(&intent.request_fingerprint).await.unwrap(),
        Some(RequestState::Success)
    );

    let published = h.bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "seats.updates");
    let delta: InventoryDelta = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(delta.operation, DeltaOperation::Subtract);
    assert_eq!(delta.seats, 3);

    // Propagate that single delta into C8 and confirm it decrements the
    // catalog exactly once.
    let inventory_store = Arc::new(FakeInventoryStore::with_seats("E1", 50));
    let dedup = Arc::new(FakeDedupStore::default());
    let inventory_consumer = InventoryUpdateConsumer::new(inventory_store.clone(), dedup.clone(), retry(), breaker());

    let outcome = inventory_consumer.handle(&published[0].key, &published[0].payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);
    assert_eq!(inventory_store.current("E1"), Some(47));
    assert!(dedup.exists(&published[0].key).await.unwrap());
}

/// S2: insufficient seats. No inventory delta is ever published, the seat
/// counter is untouched, and the booking is recorded as `failed`.
#[tokio::test]
async fn insufficient_seats_fails_without_side_effects() {
    let h = harness("E1", 2);
    let intent = booking_intent("r2", "E1", 3);
    let payload = serde_json::to_vec(&intent).unwrap();

    let outcome = h.consumer.handle(intent.request_fingerprint.as_str(), &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(2));
    let record = h.booking_store.get(&intent.request_fingerprint).expect("record persisted");
    assert_eq!(record.status, BookingStatus::Failed);
    assert_eq!(
        h.request_state.get(&intent.request_fingerprint).await.unwrap(),
        Some(RequestState::Failed)
    );
    assert!(h.bus.published().is_empty());
}

/// S3 (§8, literal scenario values): cancel arrives before the booking
/// intent. The cancel consumer writes a sticky `cancelled` label; its
/// `update_status_by_fingerprint` call matches no row (the booking consumer
/// hasn't created one yet), so it correctly performs no seat/delta
/// compensation for a reservation that never happened. When the booking
/// intent is then processed, it observes `cancelled` on arrival (§4.3 s1.1)
/// and inserts the booking record directly as `cancelled` — seats are never
/// reserved in the first place, so there is nothing to roll back.
#[tokio::test]
async fn cancel_before_booking_arrives_short_circuits_the_pipeline() {
    let h = harness("E1", 10);
    let rf = RequestFingerprint::new("r3");

    let cancel_consumer = CancelConsumer::new(
        h.seat_counter.clone(),
        h.request_state.clone(),
        h.booking_store.clone(),
        h.bus.clone(),
        None,
        retry(),
        breaker(),
    );

    let cancel = CancellationIntent {
        request_fingerprint: Some(rf.clone()),
        booking_id: None,
        event_id: EventId::new("E1"),
        seats: 4,
    };
    let cancel_payload = serde_json::to_vec(&cancel).unwrap();
    let outcome = cancel_consumer.handle(rf.as_str(), &cancel_payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.request_state.get(&rf).await.unwrap(), Some(RequestState::Cancelled));
    assert!(h.booking_store.get(&rf).is_none());
    assert_eq!(h.seat_counter.current("E1"), Some(10));
    assert!(h.bus.published().is_empty(), "nothing was reserved yet, so no compensating delta");

    let intent = BookingIntent {
        request_fingerprint: rf.clone(),
        event_id: EventId::new("E1"),
        user_id: UserId::new("u1"),
        seats: 4,
        price: None,
    };
    let booking_payload = serde_json::to_vec(&intent).unwrap();
    let outcome = h.consumer.handle(rf.as_str(), &booking_payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(10), "seat counter untouched: nothing was ever reserved");
    let record = h.booking_store.get(&rf).expect("cancelled record inserted on arrival");
    assert_eq!(record.status, BookingStatus::Cancelled);
    assert_eq!(record.seats, 4);
    assert!(h.bus.published().is_empty(), "no delta for a booking that never succeeded");
    assert_eq!(h.request_state.get(&rf).await.unwrap(), Some(RequestState::Cancelled));
}

/// S4: cancel mid-pipeline, between s1 and s3. The booking consumer advances
/// to s2, observes that the label is now `cancelled`, rolls back the seat
/// reservation itself, and the cancel consumer — seeing the inflight label
/// at the moment it ran — never double-touches C1/C3.
#[tokio::test]
async fn cancel_mid_pipeline_rolls_back_exactly_once() {
    let h = harness("E1", 10);
    let rf = RequestFingerprint::new("r4");
    let intent = booking_intent("r4", "E1", 5);
    let payload = serde_json::to_vec(&intent).unwrap();

    // Advance to s1 (seats reserved, label s2) without completing s2/s3, by
    // calling the handler once with the label pre-set to S1 (its default)
    // and manually checking it stopped only after the cancel mutates state.
    // We simulate the interleave by driving the cancel consumer once the
    // label has been advanced to `s2`, then resuming the booking consumer.
    h.request_state.set(&rf, RequestState::S2, None).await.unwrap();
    h.seat_counter.try_decrement(&EventId::new("E1"), 5).await.unwrap();

    let cancel_consumer = CancelConsumer::new(
        h.seat_counter.clone(),
        h.request_state.clone(),
        h.booking_store.clone(),
        h.bus.clone(),
        None,
        retry(),
        breaker(),
    );
    let cancel = CancellationIntent {
        request_fingerprint: Some(rf.clone()),
        booking_id: None,
        event_id: EventId::new("E1"),
        seats: 5,
    };
    let cancel_payload = serde_json::to_vec(&cancel).unwrap();
    let outcome = cancel_consumer.handle(rf.as_str(), &cancel_payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);
    assert_eq!(h.seat_counter.current("E1"), Some(5), "cancel must not touch seats while inflight");
    assert!(h.booking_store.get(&rf).is_none(), "cancel must not touch the booking store while inflight");

    let outcome = h.consumer.handle(rf.as_str(), &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(10), "booking consumer performs the single rollback");
    let record = h.booking_store.get(&rf).expect("cancelled record persisted by the booking consumer");
    assert_eq!(record.status, BookingStatus::Cancelled);
    assert!(h.bus.published().is_empty());
}

/// S5: cancel after success. The booking already emitted a `subtract` delta
/// and is `success`; the cancel consumer must publish a compensating `add`
/// delta and roll back the seat counter itself.
#[tokio::test]
async fn cancel_after_success_compensates() {
    let h = harness("E1", 10);
    let intent = booking_intent("r5", "E1", 4);
    let payload = serde_json::to_vec(&intent).unwrap();

    let outcome = h.consumer.handle(intent.request_fingerprint.as_str(), &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);
    assert_eq!(h.seat_counter.current("E1"), Some(6));
    assert_eq!(h.bus.published().len(), 1);

    let cancel_consumer = CancelConsumer::new(
        h.seat_counter.clone(),
        h.request_state.clone(),
        h.booking_store.clone(),
        h.bus.clone(),
        None,
        retry(),
        breaker(),
    );
    let cancel = CancellationIntent {
        request_fingerprint: Some(intent.request_fingerprint.clone()),
        booking_id: None,
        event_id: EventId::new("E1"),
        seats: 4,
    };
    let cancel_payload = serde_json::to_vec(&cancel).unwrap();
    let outcome = cancel_consumer.handle(intent.request_fingerprint.as_str(), &cancel_payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(10), "compensating increment restores the seats");
    let record = h.booking_store.get(&intent.request_fingerprint).expect("record updated");
    assert_eq!(record.status, BookingStatus::Cancelled);

    let published = h.bus.published();
    assert_eq!(published.len(), 2, "subtract then compensating add");
    let compensating: InventoryDelta = serde_json::from_slice(&published[1].payload).unwrap();
    assert_eq!(compensating.operation, DeltaOperation::Add);
    assert_eq!(compensating.seats, 4);
}

/// S6: redelivery. Processing the identical booking intent twice must not
/// double-decrement seats or double-publish a delta — the second delivery
/// observes the terminal `success` label and is a pure no-op.
#[tokio::test]
async fn redelivered_booking_intent_is_a_no_op() {
    let h = harness("E1", 10);
    let intent = booking_intent("r6", "E1", 3);
    let payload = serde_json::to_vec(&intent).unwrap();

    let first = h.consumer.handle(intent.request_fingerprint.as_str(), &payload).await;
    assert_eq!(first, ProcessingOutcome::Commit);
    assert_eq!(h.seat_counter.current("E1"), Some(7));
    assert_eq!(h.bus.published().len(), 1);

    let second = h.consumer.handle(intent.request_fingerprint.as_str(), &payload).await;
    assert_eq!(second, ProcessingOutcome::Commit);

    assert_eq!(h.seat_counter.current("E1"), Some(7), "redelivery must not re-decrement");
    assert_eq!(h.bus.published().len(), 1, "redelivery must not re-publish a delta");
}

/// Redelivery of the same `seats.updates` delta into C8 must not
/// double-apply it — the dedup marker makes the second application a no-op.
#[tokio::test]
async fn redelivered_inventory_delta_is_a_no_op() {
    let inventory_store = Arc::new(FakeInventoryStore::with_seats("E1", 20));
    let dedup = Arc::new(FakeDedupStore::default());
    let consumer = InventoryUpdateConsumer::new(inventory_store.clone(), dedup, retry(), breaker());

    let delta = InventoryDelta {
        event_id: EventId::new("E1"),
        seats: 3,
        operation: DeltaOperation::Subtract,
    };
    let payload = serde_json::to_vec(&delta).unwrap();

    let first = consumer.handle("r1", &payload).await;
    assert_eq!(first, ProcessingOutcome::Commit);
    assert_eq!(inventory_store.current("E1"), Some(17));

    let second = consumer.handle("r1", &payload).await;
    assert_eq!(second, ProcessingOutcome::Commit);
    assert_eq!(inventory_store.current("E1"), Some(17), "replay must not double-apply");
}

/// A cancel for an event the inventory catalog no longer knows about
/// (§4.5 step 4) is dropped rather than retried forever.
#[tokio::test]
async fn inventory_delta_for_unknown_event_is_dropped_not_retried() {
    let inventory_store = Arc::new(FakeInventoryStore::default());
    let dedup = Arc::new(FakeDedupStore::default());
    let consumer = InventoryUpdateConsumer::new(inventory_store.clone(), dedup.clone(), retry(), breaker());

    let delta = InventoryDelta {
        event_id: EventId::new("gone"),
        seats: 2,
        operation: DeltaOperation::Add,
    };
    let payload = serde_json::to_vec(&delta).unwrap();

    let outcome = consumer.handle("r1", &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);
    assert!(dedup.exists("r1").await.unwrap(), "a no-match delta is still marked applied");
}

/// A malformed cancellation intent (neither identifier set) is logged and
/// committed rather than retried forever (§4.7).
#[tokio::test]
async fn malformed_cancellation_intent_is_committed_not_retried() {
    let h = harness("E1", 10);
    let cancel_consumer = CancelConsumer::new(
        h.seat_counter.clone(),
        h.request_state.clone(),
        h.booking_store.clone(),
        h.bus.clone(),
        None,
        retry(),
        breaker(),
    );

    let malformed = CancellationIntent {
        request_fingerprint: None,
        booking_id: None,
        event_id: EventId::new("E1"),
        seats: 0,
    };
    let payload = serde_json::to_vec(&malformed).unwrap();
    let outcome = cancel_consumer.handle("whatever", &payload).await;
    assert_eq!(outcome, ProcessingOutcome::Commit);
}
