//! Compensation dead letters.
//!
//! When the compensating delete of a pending booking keeps failing after
//! exhausting its retries, the failure must not be silently dropped: a
//! record lands here for an operator to act on. This is the only error
//! class in the system that ever requires manual intervention — a stuck
//! pending booking whose seats are locked and never released is a silent
//! inventory leak.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::types::{BookingId, SeatId, ShowtimeId};

/// An operator-visible record of a compensation that could not complete
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The booking whose compensating delete kept failing
    pub booking_id: BookingId,
    /// Showtime the booking was for
    pub showtime_id: ShowtimeId,
    /// Seats the failed attempt requested, for manual reconciliation
    /// against the seat ledger
    pub seat_ids: Vec<SeatId>,
    /// Why the saga compensated in the first place
    pub reason: String,
    /// Last error from the delete attempts
    pub error: String,
    /// How many delete attempts were made before giving up
    pub attempts: u32,
    /// When the compensation was abandoned
    pub failed_at: DateTime<Utc>,
}

/// Sink for abandoned compensations.
///
/// Implementations must be durable enough for an operator to find the
/// record later; an in-memory implementation is only suitable for tests.
pub trait CompensationDeadLetters: Send + Sync {
    /// Record an abandoned compensation.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the record could not be written; callers
    /// log that failure loudly, as there is nothing further to fall back to.
    fn record(
        &self,
        letter: DeadLetter,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
