//! The Inventory Store port (C4, §4.5, §6) and the C8 dedup marker port.

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::EventId;
use crate::message::DeltaOperation;

/// Errors from inventory store operations. Transport-level only; a
/// zero-matched-document update is a normal, non-error outcome (§4.5 step
/// 4: "log and commit").
#[derive(Error, Debug, Clone)]
pub enum InventoryStoreError {
    /// The store could not be reached or returned a transport-level error.
    #[error("inventory store transport error: {0}")]
    Transport(String),
}

/// Whether an inventory update matched a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The document existed and `available_seats` was adjusted.
    Applied,
    /// No document exists for that event id; nothing was changed.
    NoMatch,
}

/// Durable document store holding the authoritative `available_seats` per
/// event (§3 "Inventory Store", §4.5).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Apply `operation` with magnitude `seats` to `available_seats` for
    /// `event_id` (`$inc`-style atomic increment/decrement, §4.5 step 3).
    ///
    /// # Errors
    ///
    /// Returns [`InventoryStoreError::Transport`] if the store is unreachable.
    async fn apply_delta(
        &self,
        event_id: &EventId,
        operation: DeltaOperation,
        seats: u32,
    ) -> Result<ApplyOutcome, InventoryStoreError>;
}

/// Errors from dedup marker operations.
#[derive(Error, Debug, Clone)]
pub enum DedupStoreError {
    /// The store could not be reached or returned a transport-level error.
    #[error("dedup store transport error: {0}")]
    Transport(String),
}

/// The C8 dedup marker store (§3 "Dedup Marker", §4.5). Keyed by an
/// arbitrary string (the originating request fingerprint, or a
/// cancel-derived key for compensating deltas, §4.4).
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether a marker is already present for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DedupStoreError::Transport`] if the store is unreachable.
    async fn exists(&self, key: &str) -> Result<bool, DedupStoreError>;

    /// Set the marker for `key` with a 5-minute TTL (§3, §6).
    ///
    /// # Errors
    ///
    /// Returns [`DedupStoreError::Transport`] if the store is unreachable.
    async fn mark_applied(&self, key: &str) -> Result<(), DedupStoreError>;
}
