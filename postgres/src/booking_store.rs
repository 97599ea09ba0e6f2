//! PostgreSQL booking record store.
//!
//! Bookings, their line items, and the idempotency-key index live in three
//! tables tied together by `ON DELETE CASCADE` (see `schema.sql`). The two
//! saga-critical properties are upheld here:
//!
//! - `create_pending` inserts the booking, its line items, and the key claim
//!   in one transaction; a key conflict rolls the whole insert back and
//!   reports the booking the key already belongs to.
//! - `delete` is one idempotent statement whose cascade removes the line
//!   items and frees the key.
//!
//! Money is stored as `BIGINT` minor units; amounts beyond the signed range
//! are refused at the boundary rather than silently truncated.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use marquee_core::store::{BookingRecord, BookingStore, CreatePending, StoreError};
use marquee_core::types::{
    Booking, BookingId, BookingStatus, IdempotencyKey, LineItem, Money, ProductId, PromotionId,
    SeatId, ShowtimeId, UserId,
};

pub(crate) fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub(crate) fn money_to_db(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.minor())
        .map_err(|_| StoreError::Backend(format!("money amount {amount} exceeds BIGINT range")))
}

pub(crate) fn money_from_db(value: i64) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Backend(format!("negative money amount {value} in storage")))
}

fn row_to_booking(row: &PgRow) -> Result<Booking, StoreError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let status = BookingStatus::from_str(&status)
        .map_err(|err| StoreError::Backend(err.to_string()))?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(backend)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(backend)?),
        showtime_id: ShowtimeId::from_uuid(row.try_get("showtime_id").map_err(backend)?),
        status,
        subtotal: money_from_db(row.try_get("subtotal").map_err(backend)?)?,
        discount: money_from_db(row.try_get("discount").map_err(backend)?)?,
        total: money_from_db(row.try_get("total").map_err(backend)?)?,
        promotion_id: row
            .try_get::<Option<Uuid>, _>("promotion_id")
            .map_err(backend)?
            .map(PromotionId::from_uuid),
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn row_to_line_item(row: &PgRow) -> Result<LineItem, StoreError> {
    let kind: String = row.try_get("kind").map_err(backend)?;
    let item_id: Uuid = row.try_get("item_id").map_err(backend)?;
    let quantity: i32 = row.try_get("quantity").map_err(backend)?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Backend(format!("negative quantity {quantity} in storage")))?;
    let unit_price = money_from_db(row.try_get("unit_price").map_err(backend)?)?;

    match kind.as_str() {
        "SEAT" => Ok(LineItem::seat(SeatId::from_uuid(item_id), unit_price)),
        "PRODUCT" => Ok(LineItem::product(
            ProductId::from_uuid(item_id),
            quantity,
            unit_price,
        )),
        other => Err(StoreError::Backend(format!(
            "unknown line item kind {other:?} in storage"
        ))),
    }
}

/// PostgreSQL-backed booking record store
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    /// Create a store over an existing connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn line_items_of(&self, booking_id: BookingId) -> Result<Vec<LineItem>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT kind, item_id, quantity, unit_price
            FROM booking_line_items
            WHERE booking_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_line_item).collect()
    }
}

impl BookingStore for PgBookingStore {
    fn create_pending(
        &self,
        record: BookingRecord,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Pin<Box<dyn Future<Output = Result<CreatePending, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let booking = &record.booking;
            let mut tx = self.pool.begin().await.map_err(backend)?;

            sqlx::query(
                r"
                INSERT INTO bookings (
                    id, user_id, showtime_id, status,
                    subtotal, discount, total, promotion_id, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.user_id.as_uuid())
            .bind(booking.showtime_id.as_uuid())
            .bind(booking.status.as_str())
            .bind(money_to_db(booking.subtotal)?)
            .bind(money_to_db(booking.discount)?)
            .bind(money_to_db(booking.total)?)
            .bind(booking.promotion_id.as_ref().map(PromotionId::as_uuid))
            .bind(booking.created_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            for (position, item) in record.line_items.iter().enumerate() {
                let position = i32::try_from(position).map_err(|_| {
                    StoreError::Backend("line item position exceeds INT range".to_owned())
                })?;
                let quantity = i32::try_from(item.quantity).map_err(|_| {
                    StoreError::Backend(format!("quantity {} exceeds INT range", item.quantity))
                })?;
                sqlx::query(
                    r"
                    INSERT INTO booking_line_items (
                        booking_id, position, kind, item_id, quantity, unit_price
                    ) VALUES ($1, $2, $3, $4, $5, $6)
                    ",
                )
                .bind(booking.id.as_uuid())
                .bind(position)
                .bind(item.kind.as_str())
                .bind(item.kind.item_uuid())
                .bind(quantity)
                .bind(money_to_db(item.unit_price)?)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }

            if let Some(key) = &idempotency_key {
                // Claiming the key is the last write in the transaction: a
                // conflict rolls the booking and its line items back too.
                let claimed = sqlx::query(
                    r"
                    INSERT INTO booking_idempotency_keys (key, booking_id)
                    VALUES ($1, $2)
                    ON CONFLICT (key) DO NOTHING
                    ",
                )
                .bind(key.as_str())
                .bind(booking.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

                if claimed.rows_affected() == 0 {
                    tx.rollback().await.map_err(backend)?;
                    let existing: (Uuid,) = sqlx::query_as(
                        "SELECT booking_id FROM booking_idempotency_keys WHERE key = $1",
                    )
                    .bind(key.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(backend)?;
                    tracing::info!(
                        booking_id = %booking.id,
                        existing = %existing.0,
                        "idempotency key already claimed, insert rolled back"
                    );
                    return Ok(CreatePending::Duplicate {
                        existing: BookingId::from_uuid(existing.0),
                    });
                }
            }

            tx.commit().await.map_err(backend)?;
            tracing::debug!(
                booking_id = %booking.id,
                line_items = record.line_items.len(),
                "pending booking persisted"
            );
            Ok(CreatePending::Created)
        })
    }

    fn confirm(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let updated = sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2")
                .bind(BookingStatus::Confirmed.as_str())
                .bind(booking_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(backend)?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::NotFound(booking_id));
            }
            Ok(())
        })
    }

    fn delete(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            // The cascade removes line items and frees the idempotency key;
            // deleting an absent booking is a no-op so compensation retries
            // converge.
            sqlx::query("DELETE FROM bookings WHERE id = $1")
                .bind(booking_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(backend)?;
            tracing::debug!(booking_id = %booking_id, "booking deleted");
            Ok(())
        })
    }

    fn get(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BookingRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, user_id, showtime_id, status,
                       subtotal, discount, total, promotion_id, created_at
                FROM bookings
                WHERE id = $1
                ",
            )
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

            let Some(row) = row else {
                return Ok(None);
            };
            let booking = row_to_booking(&row)?;
            let line_items = self.line_items_of(booking.id).await?;
            Ok(Some(BookingRecord {
                booking,
                line_items,
            }))
        })
    }

    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BookingRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, user_id, showtime_id, status,
                       subtotal, discount, total, promotion_id, created_at
                FROM bookings
                WHERE user_id = $1
                ORDER BY created_at DESC
                ",
            )
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

            let mut records = Vec::with_capacity(rows.len());
            for row in &rows {
                let booking = row_to_booking(row)?;
                let line_items = self.line_items_of(booking.id).await?;
                records.push(BookingRecord {
                    booking,
                    line_items,
                });
            }
            Ok(records)
        })
    }
}
