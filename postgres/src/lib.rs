//! # Marquee Postgres
//!
//! Durable PostgreSQL implementations of the booking record store and the
//! compensation dead-letter sink.
//!
//! [`PgBookingStore`] persists bookings with their line items and the
//! idempotency-key index; the schema (see `schema.sql`) cascades both on
//! delete, so the saga's compensating delete is a single statement.
//! [`PgDeadLetters`] is the operator-facing sink for compensations that
//! exhausted their retries, with a small triage surface
//! ([`PgDeadLetters::list_open`], [`PgDeadLetters::mark_resolved`]).
//!
//! # Example
//!
//! ```no_run
//! use marquee_postgres::PgBookingStore;
//!
//! # async fn example() -> Result<(), sqlx::Error> {
//! let pool = marquee_postgres::connect("postgres://localhost/marquee").await?;
//! let store = PgBookingStore::new(pool);
//! # Ok(())
//! # }
//! ```

pub mod booking_store;
pub mod dead_letters;

pub use booking_store::PgBookingStore;
pub use dead_letters::{PgDeadLetters, StoredDeadLetter};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect a pool with defaults suitable for the booking services.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] if the database is unreachable.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}
