//! Inventory service contract.
//!
//! The booking orchestrator reaches the inventory side exclusively through
//! [`InventoryApi`]: three request/response operations carried over an
//! asynchronous transport. The contract mirrors the seat ledger's state
//! machine:
//!
//! ```text
//!                  lock_seats (holder attached)
//!   AVAILABLE ────────────────────────────────▶ LOCKED ─────────▶ BOOKED
//!       ▲                                          │   mark_booked
//!       └──────────────────────────────────────────┘
//!            unlock_seats / lock expiry (holder must match)
//! ```
//!
//! # Safe-retry contract
//!
//! Every operation here is designed to be safe under at-least-once delivery,
//! so a transport layer may redeliver freely:
//!
//! - `get_showtime` is a pure read.
//! - `lock_seats` is **idempotent by rejection**: a redelivered lock finds
//!   its seats already `LOCKED` and rejects the whole batch without mutating
//!   anything, rather than double-locking.
//! - `unlock_seats` is **idempotent by construction**: releasing a seat that
//!   is not locked by the supplied booking is a no-op, so replays converge
//!   on the same final state.
//!
//! A timed-out call therefore has an **unknown outcome**, not a failed one:
//! the caller must compensate (unlock the same seat set, then delete its
//! pending booking) instead of assuming either success or failure.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BookingId, SeatId, Showtime, ShowtimeId};

/// Errors surfaced by inventory operations.
///
/// `Transport` covers timeouts and unreachable-service failures; callers
/// treat it as an unknown outcome per the module-level contract.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The showtime has no seat ledger on the inventory side
    #[error("showtime {0} not found")]
    ShowtimeNotFound(ShowtimeId),

    /// The call never produced a definitive answer
    #[error("inventory transport failure: {0}")]
    Transport(String),
}

/// Result of a `lock_seats` call.
///
/// All-or-nothing per request: either every requested seat is in `locked`
/// and `rejected` is empty, or no seat was locked and `rejected` names the
/// contested ones. Both sets are sorted for deterministic reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    /// Seats now locked by the requesting booking
    pub locked: Vec<SeatId>,
    /// Seats that were not available, causing the batch to fail
    pub rejected: Vec<SeatId>,
}

impl LockResponse {
    /// Whether the whole batch was locked
    #[must_use]
    pub fn all_locked(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Result of an `unlock_seats` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockResponse {
    /// Seats released back to available by this call
    pub released: Vec<SeatId>,
}

/// The three remote operations of the inventory service.
///
/// Dyn-compatible: methods return boxed futures so the orchestrator can hold
/// the service as `Arc<dyn InventoryApi>` and tests can substitute doubles.
/// Timeout enforcement is the caller's job; implementations only report
/// transport failures they observe themselves.
pub trait InventoryApi: Send + Sync {
    /// Fetch a showtime by id.
    ///
    /// Returns [`InventoryError::ShowtimeNotFound`] if the inventory side has
    /// no ledger for it.
    fn get_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> Pin<Box<dyn Future<Output = Result<Showtime, InventoryError>> + Send + '_>>;

    /// Atomically lock a batch of seats for a booking.
    ///
    /// All-or-nothing: if any requested seat is not available the whole
    /// batch fails, no seat is locked, and the response's `rejected` set
    /// names the contested seats. A seat id with no ledger entry counts as
    /// rejected.
    fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<LockResponse, InventoryError>> + Send + '_>>;

    /// Release seats previously locked by `booking_id`.
    ///
    /// Best-effort and idempotent: seats not currently locked by the given
    /// booking are skipped, and an unknown showtime yields an empty
    /// released set rather than an error.
    fn unlock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<UnlockResponse, InventoryError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_response_reports_batch_outcome() {
        let full = LockResponse {
            locked: vec![SeatId::new()],
            rejected: vec![],
        };
        assert!(full.all_locked());

        let contested = LockResponse {
            locked: vec![],
            rejected: vec![SeatId::new()],
        };
        assert!(!contested.all_locked());
    }
}
