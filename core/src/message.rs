//! Wire messages carried on the message bus (§3, §6).
//!
//! All three topics carry UTF-8 JSON values keyed by request fingerprint.
//! The field names below are load-bearing: they match §6 exactly so that a
//! gateway and a consumer built independently from this spec still
//! interoperate on the wire.

use serde::{Deserialize, Serialize};

use crate::ids::{EventId, RequestFingerprint, UserId};

/// A booking intent published on `bookings.requests` (§3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingIntent {
    /// The idempotency key for this intent; also the bus partition key.
    #[serde(rename = "request_id")]
    pub request_fingerprint: RequestFingerprint,
    /// The event being booked against.
    pub event_id: EventId,
    /// The user making the booking.
    pub user_id: UserId,
    /// Number of seats requested. Always positive.
    pub seats: u32,
    /// Optional price hint from the gateway. The booking consumer does not
    /// trust this field — it reads the authoritative per-seat price from
    /// the price cache at persistence time (§9).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// A cancellation intent published on `cancel.requests` (§3, §6).
///
/// At least one of `request_fingerprint` or `booking_id` must be present;
/// callers are expected to have validated this before publishing (the
/// gateway does; `CancelConsumer` also treats an intent with neither set as
/// malformed, §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationIntent {
    /// RF-keyed cancel: present when the client cancels by request id.
    #[serde(
        rename = "booking_request_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_fingerprint: Option<RequestFingerprint>,
    /// DB-keyed cancel: present when the client cancels by booking id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    /// The event the cancelled booking was against.
    pub event_id: EventId,
    /// Seats to restore. May be zero if the caller doesn't yet know the
    /// seat count (no restoration is then published, §4.4).
    pub seats: u32,
}

impl CancellationIntent {
    /// Whether this intent carries neither identifier — the malformed case
    /// from §4.7 ("log, commit").
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        self.request_fingerprint.is_none() && self.booking_id.is_none()
    }
}

/// The direction of an inventory delta (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOperation {
    /// Restore seats to the event (compensating action).
    Add,
    /// Remove seats from the event (forward booking action).
    Subtract,
}

impl DeltaOperation {
    /// The signed delta to apply to `available_seats` for a given seat
    /// count.
    #[must_use]
    pub const fn signed(self, seats: i64) -> i64 {
        match self {
            Self::Add => seats,
            Self::Subtract => -seats,
        }
    }
}

/// An inventory delta published on `seats.updates` (§3, §6), keyed by the
/// originating request fingerprint so the inventory-update consumer (C8)
/// can deduplicate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDelta {
    /// The event the delta applies to.
    pub event_id: EventId,
    /// Number of seats to add or subtract. Always positive; direction comes
    /// from `operation`.
    pub seats: u32,
    /// Whether to add or subtract `seats` from `available_seats`.
    pub operation: DeltaOperation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_intent_wire_format_matches_spec() {
        let json = r#"{"request_id":"r1","event_id":"E1","user_id":"u1","seats":3}"#;
        let intent: BookingIntent = serde_json::from_str(json).expect("valid booking intent");
        assert_eq!(intent.request_fingerprint, RequestFingerprint::new("r1"));
        assert_eq!(intent.event_id, EventId::new("E1"));
        assert_eq!(intent.seats, 3);
        assert_eq!(intent.price, None);
    }

    #[test]
    fn cancellation_intent_requires_one_identifier() {
        let rf_only = CancellationIntent {
            request_fingerprint: Some(RequestFingerprint::new("r1")),
            booking_id: None,
            event_id: EventId::new("E1"),
            seats: 4,
        };
        assert!(!rf_only.is_malformed());

        let neither = CancellationIntent {
            request_fingerprint: None,
            booking_id: None,
            event_id: EventId::new("E1"),
            seats: 4,
        };
        assert!(neither.is_malformed());
    }

    #[test]
    fn inventory_delta_wire_format_matches_spec() {
        let json = r#"{"event_id":"E1","seats":3,"operation":"subtract"}"#;
        let delta: InventoryDelta = serde_json::from_str(json).expect("valid delta");
        assert_eq!(delta.operation, DeltaOperation::Subtract);
        assert_eq!(delta.operation.signed(3), -3);
    }
}
