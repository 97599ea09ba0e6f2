//! Booking record store contract.
//!
//! Durable storage for bookings and their line items, owned exclusively by
//! the booking orchestrator and independent of the seat ledger. Two
//! operations carry the saga's correctness weight:
//!
//! - `create_pending` persists the booking *before* any seat lock is
//!   attempted, so the lock's holder id always refers to a durable row, and
//!   deduplicates the client's idempotency key in the same atomic unit.
//! - `delete` is the compensating action: it removes the booking and its
//!   line items in one transaction (cascade) and is idempotent, because
//!   compensation is retried until it sticks.
//!
//! Records are arena-style: the store maps a booking id to the booking and
//! its child line items; line items never point back at their booking.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Booking, BookingId, IdempotencyKey, LineItem, UserId};

/// Errors surfaced by the record store
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The booking does not exist
    #[error("booking {0} not found")]
    NotFound(BookingId),

    /// The storage backend failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A booking together with its line items — the unit the store persists,
/// returns, and cascades on delete
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// The booking row
    pub booking: Booking,
    /// Child line items, stored by booking id with no back-pointer
    pub line_items: Vec<LineItem>,
}

/// Outcome of `create_pending`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreatePending {
    /// The record was inserted
    Created,
    /// The idempotency key already maps to a live booking; nothing was
    /// inserted
    Duplicate {
        /// The booking the key already belongs to
        existing: BookingId,
    },
}

/// Durable booking + line-item storage.
///
/// Dyn-compatible; the orchestrator holds it as `Arc<dyn BookingStore>`.
pub trait BookingStore: Send + Sync {
    /// Persist a pending booking and its line items transactionally.
    ///
    /// When `idempotency_key` is supplied and already maps to a live
    /// booking, nothing is inserted and [`CreatePending::Duplicate`] names
    /// the existing booking. The key association is created in the same
    /// atomic unit as the insert and dies with the booking's deletion.
    ///
    /// The record is persisted verbatim; callers create bookings in
    /// `Pending` status.
    fn create_pending(
        &self,
        record: BookingRecord,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Pin<Box<dyn Future<Output = Result<CreatePending, StoreError>> + Send + '_>>;

    /// Promote a pending booking to confirmed.
    ///
    /// Returns [`StoreError::NotFound`] if the booking does not exist.
    fn confirm(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Delete a booking and cascade to its line items and idempotency key.
    ///
    /// Idempotent: deleting a booking that does not exist is a no-op, so a
    /// retried compensation converges.
    fn delete(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Fetch a booking with its line items
    fn get(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BookingRecord>, StoreError>> + Send + '_>>;

    /// All bookings of a user, newest first
    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BookingRecord>, StoreError>> + Send + '_>>;
}
