//! The Seat Counter port (C1, §4.1).
//!
//! Both operations are specified as single server-side atomic scripts
//! against one key so that concurrent workers racing on the same event
//! never observe a negative counter (§3 invariant) or double-decrement past
//! capacity (§8 property 2).

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::EventId;

/// Errors from seat counter operations. Every variant here is a transport
/// failure (§4.7: "C1 transport error in s1 → no offset commit"); domain
/// outcomes like "insufficient seats" are modeled as [`DecrementOutcome`],
/// not errors, because they are expected, handled results rather than
/// failures of the store itself.
#[derive(Error, Debug, Clone)]
pub enum SeatCounterError {
    /// The store could not be reached or returned a transport-level error.
    #[error("seat counter transport error: {0}")]
    Transport(String),
}

/// The result of [`SeatCounter::try_decrement`] (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// The counter had enough seats and was decremented.
    Ok,
    /// The counter existed but had fewer than `n` seats available.
    Insufficient,
    /// The counter key does not exist (the event is unknown to C1).
    Unknown,
}

/// Per-event integer seat counter (§3 "Seat Counter", §4.1).
///
/// # Dyn Compatibility
///
/// Like the teacher's `EventBus` trait, this is written with `#[async_trait]`
/// so it can be stored behind `Arc<dyn SeatCounter>` in the consumer
/// binaries while still being trivially fakeable in tests.
#[async_trait]
pub trait SeatCounter: Send + Sync {
    /// Atomically test-and-decrement `seats:<event_id>` by `n`.
    ///
    /// Never mutates the counter unless it returns
    /// [`DecrementOutcome::Ok`].
    ///
    /// # Errors
    ///
    /// Returns [`SeatCounterError::Transport`] if the store is unreachable.
    async fn try_decrement(&self, event_id: &EventId, n: u32) -> Result<DecrementOutcome, SeatCounterError>;

    /// Unconditionally increment `seats:<event_id>` by `n`. Used only as a
    /// rollback (§4.1); never fails the caller's pipeline because
    /// compensation is idempotent over the request fingerprint (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`SeatCounterError::Transport`] if the store is unreachable.
    async fn increment(&self, event_id: &EventId, n: u32) -> Result<(), SeatCounterError>;
}
