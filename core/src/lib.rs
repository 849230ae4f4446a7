//! Domain types and store/bus ports for the booking pipeline.
//!
//! This crate has no knowledge of Redis, Postgres, or Kafka. It defines:
//!
//! - The wire messages that travel across the message bus (§3, §6 of the spec).
//! - The request fingerprint and lifecycle label that drive the booking
//!   state machine (§3, §4.2).
//! - The booking record and inventory document shapes (§3, §6).
//! - The store/bus traits ("ports") that the booking, cancel, and
//!   inventory-update consumers are written against. Concrete
//!   implementations live in `booking-redis`, `booking-postgres`, and
//!   `booking-bus`.
//!
//! Keeping these as traits (rather than concrete clients) is what lets the
//! consumer crate be tested against in-memory fakes without touching a real
//! Redis or Postgres instance, the same separation the teacher draws between
//! `composable_rust_core::event_bus::EventBus` and its Redpanda
//! implementation.

pub mod booking;
pub mod booking_store;
pub mod bus;
pub mod ids;
pub mod inventory_store;
pub mod message;
pub mod price_cache;
pub mod request_state_store;
pub mod seat_counter;
pub mod state;

pub use booking::{BookingRecord, BookingStatus};
pub use booking_store::{BookingStore, BookingStoreError};
pub use bus::{BusError, CommitToken, Delivery, DeliveryStream, MessageBus, Topic};
pub use ids::{BookingId, EventId, RequestFingerprint, UserId};
pub use inventory_store::{
    ApplyOutcome, DedupStore, DedupStoreError, InventoryStore, InventoryStoreError,
};
pub use message::{BookingIntent, CancellationIntent, DeltaOperation, InventoryDelta};
pub use price_cache::{PriceCache, PriceCacheError};
pub use request_state_store::{RequestStateError, RequestStateStore};
pub use seat_counter::{DecrementOutcome, SeatCounter, SeatCounterError};
pub use state::RequestState;
