//! `PostgreSQL`-backed implementations of the durable-store ports defined in
//! `booking-core`: the booking record store (C3) and the inventory store
//! (C4), plus a dead letter queue for messages that can't be processed.
//!
//! Built on sqlx connection pooling the same way the teacher's event store
//! crate is, but without its event-sourcing machinery — this crate talks in
//! plain rows, not serialized events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod booking_store;
mod dead_letter_queue;
mod inventory_store;

pub use booking_store::PostgresBookingStore;
pub use dead_letter_queue::{DeadLetterQueue, DlqStatus, FailedMessage};
pub use inventory_store::PostgresInventoryStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

/// Errors establishing a Postgres connection pool.
#[derive(Error, Debug)]
pub enum PostgresConnectError {
    /// The pool could not be created (bad URL, connection refused, etc).
    #[error("postgres connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),
    /// Embedded migrations failed to apply.
    #[error("postgres migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Connect to Postgres at `database_url` with `max_connections`, running
/// embedded migrations before returning the pool.
///
/// # Errors
///
/// Returns [`PostgresConnectError`] if the pool can't be established or a
/// migration fails to apply.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, PostgresConnectError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(PostgresConnectError::ConnectionFailed)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(PostgresConnectError::MigrationFailed)?;

    Ok(pool)
}
