//! In-memory fakes for the store/bus ports, grounded on the teacher's
//! `InMemoryProjectionStore`/`InMemoryEventBus` pattern: `Arc<Mutex<HashMap<..>>>`
//! behind a thin trait impl, fast and deterministic, no real Redis/Postgres/
//! Kafka required.

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use booking_core::{
    ApplyOutcome, BookingRecord, BookingStatus, BookingStore, BookingStoreError, DecrementOutcome,
    DedupStore, DedupStoreError, DeltaOperation, EventId, InventoryStore, InventoryStoreError,
    PriceCache, PriceCacheError, RequestFingerprint, RequestState, RequestStateError,
    RequestStateStore, SeatCounter, SeatCounterError,
};

/// Fake C1: a plain in-memory counter per event id.
#[derive(Default)]
pub struct FakeSeatCounter {
    counters: Mutex<HashMap<EventId, i64>>,
}

impl FakeSeatCounter {
    pub fn with_seats(event_id: &str, seats: i64) -> Self {
        let mut counters = HashMap::new();
        counters.insert(EventId::new(event_id), seats);
        Self { counters: Mutex::new(counters) }
    }

    pub fn current(&self, event_id: &str) -> Option<i64> {
        self.counters.lock().unwrap().get(&EventId::new(event_id)).copied()
    }
}

#[async_trait]
impl SeatCounter for FakeSeatCounter {
    async fn try_decrement(&self, event_id: &EventId, n: u32) -> Result<DecrementOutcome, SeatCounterError> {
        let mut counters = self.counters.lock().unwrap();
        let Some(available) = counters.get_mut(event_id) else {
            return Ok(DecrementOutcome::Unknown);
        };
        if *available >= i64::from(n) {
            *available -= i64::from(n);
            Ok(DecrementOutcome::Ok)
        } else {
            Ok(DecrementOutcome::Insufficient)
        }
    }

    async fn increment(&self, event_id: &EventId, n: u32) -> Result<(), SeatCounterError> {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(event_id.clone()).or_insert(0) += i64::from(n);
        Ok(())
    }
}

/// Fake C2: enforces the same sticky-cancellation rule the Redis Lua script
/// does, entirely in memory.
#[derive(Default)]
pub struct FakeRequestStateStore {
    labels: Mutex<HashMap<RequestFingerprint, RequestState>>,
}

#[async_trait]
impl RequestStateStore for FakeRequestStateStore {
    async fn get(&self, rf: &RequestFingerprint) -> Result<Option<RequestState>, RequestStateError> {
        Ok(self.labels.lock().unwrap().get(rf).copied())
    }

    async fn set(
        &self,
        rf: &RequestFingerprint,
        label: RequestState,
        _ttl: Option<Duration>,
    ) -> Result<(), RequestStateError> {
        self.labels.lock().unwrap().insert(rf.clone(), label);
        Ok(())
    }

    async fn compare_and_advance(
        &self,
        rf: &RequestFingerprint,
        next: RequestState,
        _ttl: Duration,
    ) -> Result<Option<RequestState>, RequestStateError> {
        let mut labels = self.labels.lock().unwrap();
        let prior = labels.get(rf).copied();
        if prior == Some(RequestState::Cancelled) {
            return Ok(Some(RequestState::Cancelled));
        }
        labels.insert(rf.clone(), next);
        Ok(prior)
    }
}

/// Fake C3: `request_id`-unique, insert-if-absent, one-way status update.
#[derive(Default)]
pub struct FakeBookingStore {
    by_rf: Mutex<HashMap<RequestFingerprint, BookingRecord>>,
}

impl FakeBookingStore {
    pub fn get(&self, rf: &RequestFingerprint) -> Option<BookingRecord> {
        self.by_rf.lock().unwrap().get(rf).cloned()
    }
}

#[async_trait]
impl BookingStore for FakeBookingStore {
    async fn insert_if_absent(&self, record: &BookingRecord) -> Result<bool, BookingStoreError> {
        let mut by_rf = self.by_rf.lock().unwrap();
        if by_rf.contains_key(&record.request_fingerprint) {
            return Ok(false);
        }
        by_rf.insert(record.request_fingerprint.clone(), record.clone());
        Ok(true)
    }

    async fn update_status_by_fingerprint(
        &self,
        rf: &RequestFingerprint,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError> {
        if let Some(record) = self.by_rf.lock().unwrap().get_mut(rf) {
            record.status = status;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn update_status_by_booking_id(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError> {
        let mut by_rf = self.by_rf.lock().unwrap();
        if let Some(record) = by_rf.values_mut().find(|r| r.id.to_string() == booking_id) {
            record.status = status;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Fake price cache, fixed at construction.
pub struct FakePriceCache {
    price: Option<f64>,
}

impl FakePriceCache {
    pub const fn with_price(price: f64) -> Self {
        Self { price: Some(price) }
    }

    pub const fn absent() -> Self {
        Self { price: None }
    }
}

#[async_trait]
impl PriceCache for FakePriceCache {
    async fn get(&self, _event_id: &EventId) -> Result<Option<f64>, PriceCacheError> {
        Ok(self.price)
    }
}

/// A captured publish call, for asserting what a consumer emitted to
/// `seats.updates` (§8's "one `subtract 3` delta applied").
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Fake C5: captures every publish; `subscribe`/`commit` are unused by the
/// consumer-handler tests in this crate (they drive `MessageHandler::handle`
/// directly rather than through `ConsumerRunner`).
#[derive(Default)]
pub struct FakeBus {
    published: Mutex<Vec<PublishedMessage>>,
}

impl FakeBus {
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl booking_core::MessageBus for FakeBus {
    async fn publish(&self, topic: booking_core::Topic, key: &str, payload: &[u8]) -> Result<(), booking_core::BusError> {
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        _topic: booking_core::Topic,
        _consumer_group: &str,
    ) -> Result<booking_core::DeliveryStream, booking_core::BusError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn commit(&self, _token: booking_core::CommitToken) -> Result<(), booking_core::BusError> {
        Ok(())
    }
}

/// Fake C4: `event_id -> available_seats`, `None` means "deleted from the
/// catalog" (§4.5 step 4 no-match path).
#[derive(Default)]
pub struct FakeInventoryStore {
    seats: Mutex<HashMap<EventId, i64>>,
}

impl FakeInventoryStore {
    pub fn with_seats(event_id: &str, seats: i64) -> Self {
        let mut map = HashMap::new();
        map.insert(EventId::new(event_id), seats);
        Self { seats: Mutex::new(map) }
    }

    pub fn current(&self, event_id: &str) -> Option<i64> {
        self.seats.lock().unwrap().get(&EventId::new(event_id)).copied()
    }
}

#[async_trait]
impl InventoryStore for FakeInventoryStore {
    async fn apply_delta(
        &self,
        event_id: &EventId,
        operation: DeltaOperation,
        seats: u32,
    ) -> Result<ApplyOutcome, InventoryStoreError> {
        let mut map = self.seats.lock().unwrap();
        let Some(current) = map.get_mut(event_id) else {
            return Ok(ApplyOutcome::NoMatch);
        };
        *current += operation.signed(i64::from(seats));
        Ok(ApplyOutcome::Applied)
    }
}

/// Fake C8 dedup marker: a plain in-memory set.
#[derive(Default)]
pub struct FakeDedupStore {
    applied: Mutex<std::collections::HashSet<String>>,
}

#[async_trait]
impl DedupStore for FakeDedupStore {
    async fn exists(&self, key: &str) -> Result<bool, DedupStoreError> {
        Ok(self.applied.lock().unwrap().contains(key))
    }

    async fn mark_applied(&self, key: &str) -> Result<(), DedupStoreError> {
        self.applied.lock().unwrap().insert(key.to_string());
        Ok(())
    }
}
