//! Dead letter queue for bus messages that can't be processed.
//!
//! Grounded on the teacher's event-store DLQ (same status lifecycle,
//! tracing/metrics-on-mutation discipline), adapted from serialized domain
//! events to raw topic/key/payload bus messages since this pipeline has no
//! event-sourcing layer.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use thiserror::Error;

/// Errors from dead letter queue operations.
#[derive(Error, Debug, Clone)]
pub enum DlqError {
    /// The store could not be reached or returned a transport-level error.
    #[error("dead letter queue transport error: {0}")]
    Transport(String),
}

/// Status of an entry in the dead letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlqStatus {
    /// Pending investigation or reprocessing.
    Pending,
    /// Successfully reprocessed.
    Resolved,
    /// Permanently discarded; cannot be fixed.
    Discarded,
}

impl DlqStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            "discarded" => Some(Self::Discarded),
            _ => None,
        }
    }
}

/// An entry in the dead letter queue.
#[derive(Debug, Clone)]
pub struct FailedMessage {
    /// Unique identifier for this entry.
    pub id: i64,
    /// The bus topic the message was read from.
    pub topic: String,
    /// The message's partition key, if it had one.
    pub message_key: Option<String>,
    /// The raw payload that failed to process.
    pub payload: Vec<u8>,
    /// Human-readable description of the failure.
    pub error_message: String,
    /// Number of processing attempts before this entry was created.
    pub retry_count: i32,
    /// When this message first failed.
    pub first_failed_at: DateTime<Utc>,
    /// When this message most recently failed.
    pub last_failed_at: DateTime<Utc>,
    /// Current status.
    pub status: DlqStatus,
}

/// `PostgreSQL`-backed dead letter queue.
pub struct DeadLetterQueue {
    pool: PgPool,
}

impl DeadLetterQueue {
    /// Wrap a connected pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a message that failed to process.
    ///
    /// # Errors
    ///
    /// Returns [`DlqError::Transport`] if the insert fails.
    pub async fn add_entry(
        &self,
        topic: &str,
        message_key: Option<&str>,
        payload: &[u8],
        error_message: &str,
        retry_count: i32,
    ) -> Result<i64, DlqError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO failed_messages (topic, message_key, payload, error_message, retry_count)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(topic)
        .bind(message_key)
        .bind(payload)
        .bind(error_message)
        .bind(retry_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DlqError::Transport(e.to_string()))?;

        tracing::warn!(dlq_id = id, topic, error = error_message, retry_count, "message sent to dead letter queue");
        metrics::counter!("dlq.added", "topic" => topic.to_string()).increment(1);

        Ok(id)
    }

    /// List pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DlqError::Transport`] if the query fails.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<FailedMessage>, DlqError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic, message_key, payload, error_message, retry_count,
                   first_failed_at, last_failed_at, status
            FROM failed_messages
            WHERE status = 'pending'
            ORDER BY first_failed_at ASC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DlqError::Transport(e.to_string()))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Mark an entry as resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DlqError::Transport`] if the update fails.
    pub async fn mark_resolved(&self, id: i64, notes: Option<&str>) -> Result<(), DlqError> {
        sqlx::query(
            "UPDATE failed_messages SET status = 'resolved', resolved_at = NOW(), resolution_notes = $1 WHERE id = $2",
        )
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DlqError::Transport(e.to_string()))?;

        tracing::info!(dlq_id = id, "dead letter entry marked resolved");
        metrics::counter!("dlq.resolved").increment(1);
        Ok(())
    }

    /// Mark an entry as permanently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DlqError::Transport`] if the update fails.
    pub async fn mark_discarded(&self, id: i64, reason: &str) -> Result<(), DlqError> {
        sqlx::query(
            "UPDATE failed_messages SET status = 'discarded', resolved_at = NOW(), resolution_notes = $1 WHERE id = $2",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DlqError::Transport(e.to_string()))?;

        tracing::warn!(dlq_id = id, reason, "dead letter entry discarded");
        metrics::counter!("dlq.discarded").increment(1);
        Ok(())
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<FailedMessage, DlqError> {
        let status_str: String = row.get("status");
        let status = DlqStatus::parse(&status_str)
            .ok_or_else(|| DlqError::Transport(format!("unknown dlq status: {status_str}")))?;

        Ok(FailedMessage {
            id: row.get("id"),
            topic: row.get("topic"),
            message_key: row.get("message_key"),
            payload: row.get("payload"),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            first_failed_at: row.get("first_failed_at"),
            last_failed_at: row.get("last_failed_at"),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_status_roundtrip() {
        for status in [DlqStatus::Pending, DlqStatus::Resolved, DlqStatus::Discarded] {
            assert_eq!(DlqStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn dlq_status_rejects_unknown() {
        assert_eq!(DlqStatus::parse("bogus"), None);
    }
}
