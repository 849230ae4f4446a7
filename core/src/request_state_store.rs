//! The Request State Store port (C2, §4.2).
//!
//! `compare_and_advance` is the single synchronization primitive between the
//! booking consumer (C6) and the cancel consumer (C7): it is the only
//! operation either side uses to detect that the other has already acted on
//! the same request fingerprint (§9 "Cross-actor coordination without
//! shared memory").

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::RequestFingerprint;
use crate::state::RequestState;

/// Errors from request state store operations. All transport-level; see
/// §4.7 ("C2 transient error anywhere → no offset commit").
#[derive(Error, Debug, Clone)]
pub enum RequestStateError {
    /// The store could not be reached or returned a transport-level error.
    #[error("request state transport error: {0}")]
    Transport(String),
}

/// The request lifecycle label store (§3 "Request State", §4.2).
#[async_trait]
pub trait RequestStateStore: Send + Sync {
    /// Read the current label for a request fingerprint, or `None` if the
    /// key is absent (expired or never written).
    ///
    /// # Errors
    ///
    /// Returns [`RequestStateError::Transport`] if the store is unreachable.
    async fn get(&self, rf: &RequestFingerprint) -> Result<Option<RequestState>, RequestStateError>;

    /// Unconditionally write `label` with the given TTL. `ttl = None` means
    /// no expiry (used only for C7's `cancelled` writes, §4.2).
    ///
    /// # Errors
    ///
    /// Returns [`RequestStateError::Transport`] if the store is unreachable.
    async fn set(
        &self,
        rf: &RequestFingerprint,
        label: RequestState,
        ttl: Option<Duration>,
    ) -> Result<(), RequestStateError>;

    /// Atomically advance the label for `rf` to `next`, honoring sticky
    /// cancellation: if the current value is already [`RequestState::Cancelled`],
    /// the store is left untouched and `Some(RequestState::Cancelled)` is
    /// returned instead of writing `next` (§4.2). Otherwise `next` is
    /// written with `ttl` and the *prior* label (or `None` if absent) is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`RequestStateError::Transport`] if the store is unreachable.
    async fn compare_and_advance(
        &self,
        rf: &RequestFingerprint,
        next: RequestState,
        ttl: Duration,
    ) -> Result<Option<RequestState>, RequestStateError>;
}
