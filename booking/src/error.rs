//! The caller-visible error taxonomy of `CreateBooking`.
//!
//! Validation failures (`InvalidRequest`, `InvalidShowtime`,
//! `ProductNotFound`, `InvalidPromotion`, `DuplicateRequest`) happen before
//! any side effect exists. `SeatsUnavailable` is the one conflict outcome:
//! by the time the caller sees it, the pending booking has already been
//! compensated away. A lock call whose outcome is unknown (timeout,
//! transport failure) is folded into `SeatsUnavailable` after compensation —
//! the caller never learns whether the lock landed, only that it does not
//! hold the seats.

use thiserror::Error;

use marquee_core::store::StoreError;
use marquee_core::types::{BookingId, ProductId, SeatId, ShowtimeId};
use marquee_pricing::PromotionRejection;

/// Errors surfaced by the booking orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BookingError {
    /// The request is structurally invalid; nothing was attempted
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with it
        reason: String,
    },

    /// The showtime does not exist on the inventory side
    #[error("showtime {0} not found")]
    InvalidShowtime(ShowtimeId),

    /// A requested product is not in the catalog
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The supplied promotion code cannot be applied
    #[error("promotion {code:?} rejected: {reason}")]
    InvalidPromotion {
        /// The code as supplied by the client
        code: String,
        /// Why it was rejected
        reason: PromotionRejection,
    },

    /// Some requested seats could not be locked; the pending booking was
    /// compensated and no seats are held
    #[error("{} seats unavailable", seat_ids.len())]
    SeatsUnavailable {
        /// The contested seats (or, after an unknown lock outcome, the
        /// whole requested set), sorted
        seat_ids: Vec<SeatId>,
    },

    /// The idempotency key maps to an attempt that is still in flight
    #[error("request already in flight as booking {booking_id}")]
    DuplicateRequest {
        /// The booking the key already belongs to
        booking_id: BookingId,
    },

    /// The inventory read could not complete; nothing was created
    #[error("inventory unreachable: {0}")]
    InventoryUnreachable(String),

    /// The record store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
