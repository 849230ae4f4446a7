use async_trait::async_trait;
use booking_core::{
    BookingRecord, BookingStatus, BookingStore, BookingStoreError, RequestFingerprint,
};
use sqlx::PgPool;

/// `PostgreSQL`-backed implementation of the Booking Record Store (C3,
/// §4.3-§4.4, §6). Created exactly once per request fingerprint via
/// `ON CONFLICT (request_id) DO NOTHING` — the same do-nothing-on-conflict
/// semantics the source's GORM `clause.OnConflict{DoNothing: true}` uses.
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap a connected pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn insert_if_absent(&self, record: &BookingRecord) -> Result<bool, BookingStoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let seats = record.seats as i32;
        let result = sqlx::query(
            r"
            INSERT INTO bookings (id, request_id, user_id, event_id, price, seats, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (request_id) DO NOTHING
            ",
        )
        .bind(record.id.as_uuid())
        .bind(record.request_fingerprint.as_str())
        .bind(record.user_id.as_str())
        .bind(record.event_id.as_str())
        .bind(record.price)
        .bind(seats)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BookingStoreError::Transport(e.to_string()))?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::info!(request_id = %record.request_fingerprint, status = record.status.as_str(), "booking record inserted");
        } else {
            tracing::debug!(request_id = %record.request_fingerprint, "booking record insert was a no-op (already present)");
        }
        metrics::counter!("booking_store.insert_if_absent", "inserted" => inserted.to_string()).increment(1);

        Ok(inserted)
    }

    async fn update_status_by_fingerprint(
        &self,
        rf: &RequestFingerprint,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError> {
        let result = sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE request_id = $2")
            .bind(status.as_str())
            .bind(rf.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| BookingStoreError::Transport(e.to_string()))?;

        let matched = result.rows_affected() > 0;
        if matched {
            tracing::info!(request_id = %rf, status = status.as_str(), "booking status updated by request id");
        } else {
            tracing::debug!(request_id = %rf, status = status.as_str(), "booking status update matched no row");
        }
        Ok(matched)
    }

    async fn update_status_by_booking_id(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<bool, BookingStoreError> {
        let id: uuid::Uuid = booking_id
            .parse()
            .map_err(|_| BookingStoreError::Transport(format!("invalid booking id: {booking_id}")))?;

        let result = sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| BookingStoreError::Transport(e.to_string()))?;

        let matched = result.rows_affected() > 0;
        if matched {
            tracing::info!(booking_id = booking_id, status = status.as_str(), "booking status updated by booking id");
        } else {
            tracing::debug!(booking_id = booking_id, status = status.as_str(), "booking status update matched no row");
        }
        Ok(matched)
    }
}
