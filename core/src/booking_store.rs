//! The Booking Record Store port (C3, §4.1-§4.4, §6).

use async_trait::async_trait;
use thiserror::Error;

use crate::booking::{BookingRecord, BookingStatus};
use crate::ids::RequestFingerprint;

/// Errors from booking store operations. All transport-level; see §4.7
/// ("C3 transient error in s2 → no offset commit"). A unique-key conflict on
/// insert is deliberately *not* an error variant here — §4.7 says it "treated
/// as success (idempotent)", so [`BookingStore::insert_if_absent`] folds
/// that outcome into its `Ok` return rather than surfacing it as failure.
#[derive(Error, Debug, Clone)]
pub enum BookingStoreError {
    /// The store could not be reached or returned a transport-level error.
    #[error("booking store transport error: {0}")]
    Transport(String),
}

/// Durable, row-oriented store of bookings keyed by surrogate id, with a
/// secondary unique key on request fingerprint (§3 "Booking Record Store").
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking record if no row exists yet for
    /// `record.request_fingerprint` (do-nothing-on-conflict, §6). Returns
    /// `true` if a new row was inserted, `false` if a row already existed
    /// (the no-op, still-successful retry case from §4.3 "Idempotence").
    ///
    /// # Errors
    ///
    /// Returns [`BookingStoreError::Transport`] if the store is unreachable.
    async fn insert_if_absent(&self, record: &BookingRecord) -> Result<bool, BookingStoreError>;

    /// Update the status of the row matching `rf` to `status`. Returns
    /// `true` if a row actually matched, `false` if no row exists yet for
    /// `rf` (the inflight-cancel-before-insert race, §4.4 absent-label
    /// sub-path can still race with this). Callers that compensate the seat
    /// counter must gate that compensation on this return value — there is
    /// nothing to roll back if nothing was ever reserved.
    ///
    /// # Errors
    ///
    /// Returns [`BookingStoreError::Transport`] if the store is unreachable.
    async fn update_status_by_fingerprint(
        &self,
        rf: &RequestFingerprint,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError>;

    /// Update the status of the row matching `booking_id` to `status`
    /// (§4.4 "DB-keyed path"). Returns `true` if a row actually matched.
    ///
    /// # Errors
    ///
    /// Returns [`BookingStoreError::Transport`] if the store is unreachable.
    async fn update_status_by_booking_id(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError>;
}
