//! The price cache port (§6 "Fast store key layout": `price:<event_id>`,
//! read by C6 when materializing a booking).
//!
//! §9 flags the source's fallback-to-zero behavior as possibly buggy:
//! "if the price cache is absent the booking is persisted with price 0. A
//! reimplementation should either require the price cache to be
//! authoritative or fall back to the catalog store." There is no catalog
//! store in this pipeline's scope (§1 Non-goals: event-catalog CRUD), so
//! [`PriceCache::get`] returns `Option<f64>` and callers fall back to `0.0`
//! explicitly at the call site, preserving the source's literal behavior
//! while making the fallback visible instead of silent.

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::EventId;

/// Errors from price cache reads.
#[derive(Error, Debug, Clone)]
pub enum PriceCacheError {
    /// The store could not be reached or returned a transport-level error.
    #[error("price cache transport error: {0}")]
    Transport(String),
}

/// Read-only view of `price:<event_id>` in the fast store.
#[async_trait]
pub trait PriceCache: Send + Sync {
    /// Look up the price for `event_id`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`PriceCacheError::Transport`] if the store is unreachable.
    async fn get(&self, event_id: &EventId) -> Result<Option<f64>, PriceCacheError>;
}
