//! The durable booking record (§3, §6 "Durable booking schema").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BookingId, EventId, RequestFingerprint, UserId};

/// Status of a booking record. §3: "Updatable in one direction only:
/// `confirmed → cancelled`; `failed` is terminal."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Seats were reserved and the booking stands.
    Confirmed,
    /// Seat reservation failed (insufficient seats, or the event was
    /// unknown to the seat counter).
    Failed,
    /// The booking was cancelled, either before or after confirmation.
    Cancelled,
}

impl BookingStatus {
    /// The database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a status read back from storage.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A row in the Booking Record Store (C3). Created exactly once per request
/// fingerprint (insert-if-absent, §3); only `status` is ever updated after
/// creation, and only in the `confirmed → cancelled` direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Surrogate primary key.
    pub id: BookingId,
    /// The request fingerprint this booking was created for. Unique.
    pub request_fingerprint: RequestFingerprint,
    /// The user who made the booking.
    pub user_id: UserId,
    /// The event booked against.
    pub event_id: EventId,
    /// Total price for all seats (unit price × seat count). §9 flags that
    /// the source falls back to `0` when the price cache is absent at
    /// booking time; we preserve that behavior (see DESIGN.md).
    pub price: f64,
    /// Number of seats requested.
    pub seats: u32,
    /// Current status.
    pub status: BookingStatus,
    /// When the row was first inserted.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}
