//! The Message Bus port (C5, §3, §5, §6).
//!
//! Unlike the teacher's `EventBus` trait, `subscribe` here does not commit
//! offsets on the consumer's behalf: §5 makes "offset commit is the sole
//! durability boundary for consumer progress" and requires the commit to
//! happen *only* after the caller's handler returns without a transport
//! error. So this trait hands the caller an explicit [`Commit`] handle per
//! message instead of auto-committing after delivery to a channel.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// The three topics the booking pipeline uses (§6).
pub mod topics {
    /// Booking intents, published by the gateway, consumed by C6.
    pub const BOOKINGS_REQUESTS: &str = "bookings.requests";
    /// Cancellation intents, published by the gateway, consumed by C7.
    pub const CANCEL_REQUESTS: &str = "cancel.requests";
    /// Inventory deltas, published by C6 and C7, consumed by C8.
    pub const SEATS_UPDATES: &str = "seats.updates";
}

/// A bus topic name, re-exported for convenience at the crate root.
pub type Topic = &'static str;

/// Errors from message bus operations (§4.7: publish failures and
/// subscription failures are both transport-level; no offset is advanced).
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Failed to connect to the bus.
    #[error("bus connection failed: {0}")]
    ConnectionFailed(String),
    /// Failed to publish a message to a topic.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },
    /// Failed to subscribe to a topic.
    #[error("subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },
    /// A transport-level error while reading or committing.
    #[error("bus transport error: {0}")]
    Transport(String),
}

/// A message delivered from a subscription, paired with the means to commit
/// its offset once the caller's handler has finished successfully.
pub struct Delivery {
    /// The message key (the partition key — the request fingerprint, or a
    /// cancel-derived key for `seats.updates`, §6).
    pub key: String,
    /// The raw UTF-8 JSON payload.
    pub payload: Vec<u8>,
    /// Opaque commit token. Hand this to [`MessageBus::commit`] after the
    /// message has been fully processed.
    pub commit_token: CommitToken,
}

/// Opaque handle identifying a delivered message's position for commit
/// purposes. Implementations carry whatever internal offset bookkeeping
/// they need (partition + offset for a Kafka-backed bus, for example).
pub struct CommitToken(pub Box<dyn std::any::Any + Send>);

/// A stream of message deliveries from a subscription.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, BusError>> + Send>>;

/// The at-least-once, partitioned, keyed message bus (C5, §3).
///
/// # Offset Discipline
///
/// Per §5 ("Offset commit is the sole durability boundary for consumer
/// progress"): a caller must call [`MessageBus::commit`] if and only if its
/// handler ran to completion without a transport error. If the handler
/// fails with a transport error, the caller must simply drop the
/// [`Delivery`] without committing, leaving the message for redelivery.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` to `topic`, keyed by `key` (the request
    /// fingerprint for `bookings.requests`/`cancel.requests`, or the
    /// originating identifier for `seats.updates`, §6).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the publish fails.
    async fn publish(&self, topic: Topic, key: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Subscribe to `topic` as part of `consumer_group`, returning a stream
    /// of deliveries. §5: "the bus guarantees per-partition FIFO. Because RF
    /// is the partition key, all messages for a given RF land on the same
    /// partition and are processed in arrival order by a single task."
    ///
    /// # Errors
    ///
    /// Returns [`BusError::SubscriptionFailed`] if the subscription cannot
    /// be established.
    async fn subscribe(
        &self,
        topic: Topic,
        consumer_group: &str,
    ) -> Result<DeliveryStream, BusError>;

    /// Commit the offset identified by `token`. Must only be called after
    /// the corresponding message has been fully and successfully processed
    /// (§5, §4.3 "Offset commit discipline").
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the commit itself fails; per §4.3
    /// this should not be treated as fatal by callers (a failed commit just
    /// risks redelivery, which is safe because every mutation is
    /// idempotent).
    async fn commit(&self, token: CommitToken) -> Result<(), BusError>;
}
