//! PostgreSQL compensation dead-letter sink.
//!
//! The write side implements [`CompensationDeadLetters`] for the saga; the
//! read side is the operator triage surface: list what is open, mark what
//! has been reconciled by hand. A dead letter is never deleted — resolution
//! is an annotation, so the audit trail survives.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use marquee_core::dead_letter::{CompensationDeadLetters, DeadLetter};
use marquee_core::store::StoreError;
use marquee_core::types::{BookingId, SeatId, ShowtimeId};

use crate::booking_store::backend;

/// A dead letter as stored, with its triage metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDeadLetter {
    /// Storage identifier, used to address the entry in triage calls
    pub id: i64,
    /// The abandoned compensation as the saga reported it
    pub letter: DeadLetter,
    /// When an operator marked this entry resolved, if ever
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved it
    pub resolved_by: Option<String>,
    /// What was done about it
    pub resolution_notes: Option<String>,
}

fn row_to_stored(row: &PgRow) -> Result<StoredDeadLetter, StoreError> {
    let seat_ids: Vec<Uuid> = row.try_get("seat_ids").map_err(backend)?;
    let attempts: i32 = row.try_get("attempts").map_err(backend)?;
    let attempts = u32::try_from(attempts)
        .map_err(|_| StoreError::Backend(format!("negative attempt count {attempts} in storage")))?;

    Ok(StoredDeadLetter {
        id: row.try_get("id").map_err(backend)?,
        letter: DeadLetter {
            booking_id: BookingId::from_uuid(row.try_get("booking_id").map_err(backend)?),
            showtime_id: ShowtimeId::from_uuid(row.try_get("showtime_id").map_err(backend)?),
            seat_ids: seat_ids.into_iter().map(SeatId::from_uuid).collect(),
            reason: row.try_get("reason").map_err(backend)?,
            error: row.try_get("error").map_err(backend)?,
            attempts,
            failed_at: row.try_get("failed_at").map_err(backend)?,
        },
        resolved_at: row.try_get("resolved_at").map_err(backend)?,
        resolved_by: row.try_get("resolved_by").map_err(backend)?,
        resolution_notes: row.try_get("resolution_notes").map_err(backend)?,
    })
}

/// PostgreSQL-backed dead-letter sink with an operator triage surface
pub struct PgDeadLetters {
    pool: PgPool,
}

impl PgDeadLetters {
    /// Create a sink over an existing connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unresolved dead letters, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError::Backend`] if the query fails.
    pub async fn list_open(&self, limit: usize) -> Result<Vec<StoredDeadLetter>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r"
            SELECT id, booking_id, showtime_id, seat_ids, reason, error,
                   attempts, failed_at, resolved_at, resolved_by, resolution_notes
            FROM compensation_dead_letters
            WHERE resolved_at IS NULL
            ORDER BY failed_at ASC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_stored).collect()
    }

    /// Annotate a dead letter as reconciled by an operator.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError::Backend`] if the entry does not exist or the
    /// update fails.
    pub async fn mark_resolved(
        &self,
        id: i64,
        resolved_by: &str,
        notes: &str,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r"
            UPDATE compensation_dead_letters
            SET resolved_at = NOW(), resolved_by = $1, resolution_notes = $2
            WHERE id = $3
            ",
        )
        .bind(resolved_by)
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("dead letter {id} not found")));
        }
        tracing::info!(dead_letter_id = id, resolved_by, "dead letter resolved");
        Ok(())
    }
}

impl CompensationDeadLetters for PgDeadLetters {
    fn record(
        &self,
        letter: DeadLetter,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let seat_ids: Vec<Uuid> = letter.seat_ids.iter().map(|s| *s.as_uuid()).collect();
            let attempts = i32::try_from(letter.attempts).unwrap_or(i32::MAX);

            let id: (i64,) = sqlx::query_as(
                r"
                INSERT INTO compensation_dead_letters (
                    booking_id, showtime_id, seat_ids, reason, error, attempts, failed_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                ",
            )
            .bind(letter.booking_id.as_uuid())
            .bind(letter.showtime_id.as_uuid())
            .bind(&seat_ids)
            .bind(&letter.reason)
            .bind(&letter.error)
            .bind(attempts)
            .bind(letter.failed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

            metrics::counter!("store.dead_letter.recorded").increment(1);
            tracing::warn!(
                dead_letter_id = id.0,
                booking_id = %letter.booking_id,
                showtime_id = %letter.showtime_id,
                seats = seat_ids.len(),
                reason = %letter.reason,
                "compensation dead letter recorded"
            );
            Ok(())
        })
    }
}
