use async_trait::async_trait;
use booking_core::{ApplyOutcome, DeltaOperation, EventId, InventoryStore, InventoryStoreError};
use sqlx::PgPool;

/// `PostgreSQL`-backed implementation of the Inventory Store (C4, §4.5, §6).
///
/// The source keeps this document in MongoDB; this pipeline has no Mongo
/// driver available (see DESIGN.md Open Questions), so `available_seats`
/// lives as a plain column on a row keyed by `event_id`, updated with the
/// same `$inc`-equivalent atomic arithmetic.
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Wrap a connected pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn apply_delta(
        &self,
        event_id: &EventId,
        operation: DeltaOperation,
        seats: u32,
    ) -> Result<ApplyOutcome, InventoryStoreError> {
        let delta = operation.signed(i64::from(seats));

        let result = sqlx::query(
            "UPDATE inventory SET available_seats = available_seats + $1, updated_at = NOW() WHERE event_id = $2",
        )
        .bind(delta)
        .bind(event_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| InventoryStoreError::Transport(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::warn!(event_id = %event_id, delta, "inventory update matched no document");
            metrics::counter!("inventory_store.apply_delta.no_match").increment(1);
            Ok(ApplyOutcome::NoMatch)
        } else {
            metrics::counter!("inventory_store.apply_delta.applied").increment(1);
            Ok(ApplyOutcome::Applied)
        }
    }
}
