//! The booking saga.
//!
//! One call to [`BookingOrchestrator::create_booking`] drives a booking
//! attempt through its state machine:
//!
//! ```text
//! START → SHOWTIME_FETCHED → PRICED → BOOKING_PERSISTED_PENDING
//!       → SEATS_LOCKED → CONFIRMED
//!                     ↘ COMPENSATING → failed-and-removed
//! ```
//!
//! The pending booking is persisted *before* the lock call, so the holder id
//! on every seat lock always refers to a durable row. When the lock fails or
//! times out, the compensating delete removes the pending booking (cascading
//! line items and the idempotency key); the delete is retried with backoff
//! and dead-lettered if it keeps failing, because a pending booking whose
//! seats stay locked is a silent inventory leak.
//!
//! The orchestrator holds no lock across any remote call: the seat "lock" is
//! ledger state on the inventory side, so a crash mid-saga leaves both sides
//! in a state the expiry sweep can reconcile.

use std::collections::HashSet;
use std::sync::Arc;

use marquee_core::catalog::ProductCatalog;
use marquee_core::dead_letter::{CompensationDeadLetters, DeadLetter};
use marquee_core::environment::Clock;
use marquee_core::inventory::{InventoryApi, InventoryError};
use marquee_core::store::{BookingRecord, BookingStore, CreatePending};
use marquee_core::types::{
    Booking, BookingId, BookingStatus, CreateBookingRequest, LineItem, OrderItem, SeatId,
    Showtime, ShowtimeId, UserId,
};
use marquee_pricing::{PricingEngine, PricingError};
use marquee_runtime::deadline::{DeadlineError, with_deadline};
use marquee_runtime::retry::retry_with_backoff;

use crate::config::OrchestratorConfig;
use crate::error::BookingError;

/// The saga coordinator for booking attempts
pub struct BookingOrchestrator {
    inventory: Arc<dyn InventoryApi>,
    products: Arc<dyn ProductCatalog>,
    pricing: PricingEngine,
    store: Arc<dyn BookingStore>,
    dead_letters: Arc<dyn CompensationDeadLetters>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl BookingOrchestrator {
    /// Create an orchestrator over its collaborators
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryApi>,
        products: Arc<dyn ProductCatalog>,
        pricing: PricingEngine,
        store: Arc<dyn BookingStore>,
        dead_letters: Arc<dyn CompensationDeadLetters>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inventory,
            products,
            pricing,
            store,
            dead_letters,
            clock,
            config,
        }
    }

    /// Run one booking attempt end to end.
    ///
    /// On success the returned record is `Confirmed` and every requested
    /// seat is locked by it. On any failure after the pending write, the
    /// booking has been compensated away before this returns.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] naming the failure; see the error type for
    /// which variants imply side effects were compensated.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<BookingRecord, BookingError> {
        validate_request(&request)?;

        let showtime = self.fetch_showtime(request.showtime_id).await?;
        let (line_items, seat_ids) = self.build_line_items(&request, &showtime)?;

        let quote = self
            .pricing
            .price(&line_items, request.promotion_code.as_deref())
            .map_err(|err| match err {
                PricingError::InvalidPromotion { code, reason } => {
                    BookingError::InvalidPromotion { code, reason }
                }
                PricingError::Overflow => BookingError::InvalidRequest {
                    reason: "order total is not representable".to_owned(),
                },
            })?;

        let booking = Booking {
            id: BookingId::new(),
            user_id: request.user_id,
            showtime_id: request.showtime_id,
            status: BookingStatus::Pending,
            subtotal: quote.subtotal,
            discount: quote.discount,
            total: quote.total,
            promotion_id: quote.promotion_id,
            created_at: self.clock.now(),
        };
        let booking_id = booking.id;
        let mut record = BookingRecord {
            booking,
            line_items,
        };

        // Persist before locking: the holder id on every lock must refer to
        // a durable row.
        match self
            .store
            .create_pending(record.clone(), request.idempotency_key.clone())
            .await?
        {
            CreatePending::Created => {}
            CreatePending::Duplicate { existing } => {
                return self.replay_existing(existing).await;
            }
        }

        // Concessions-only orders have nothing to lock.
        if seat_ids.is_empty() {
            self.store.confirm(booking_id).await?;
            record.booking.status = BookingStatus::Confirmed;
            metrics::counter!("booking.saga.confirmed").increment(1);
            tracing::info!(booking_id = %booking_id, "booking confirmed without seats");
            return Ok(record);
        }

        let lock_result = with_deadline(
            self.config.lock_timeout,
            self.inventory
                .lock_seats(request.showtime_id, seat_ids.clone(), booking_id),
        )
        .await;

        match lock_result {
            Ok(response) if response.all_locked() => {
                if let Err(err) = self.store.confirm(booking_id).await {
                    // Seats are locked but the booking cannot be confirmed:
                    // release them and compensate, or they leak.
                    tracing::error!(
                        booking_id = %booking_id,
                        error = %err,
                        "confirm failed after lock, releasing seats"
                    );
                    self.release_locks(request.showtime_id, seat_ids.clone(), booking_id)
                        .await;
                    self.compensate(&record, &seat_ids, "confirm failed after lock")
                        .await;
                    return Err(err.into());
                }
                record.booking.status = BookingStatus::Confirmed;
                metrics::counter!("booking.saga.confirmed").increment(1);
                tracing::info!(
                    booking_id = %booking_id,
                    seats = seat_ids.len(),
                    total = %record.booking.total,
                    "booking confirmed"
                );
                Ok(record)
            }
            Ok(response) => {
                metrics::counter!("booking.saga.rejected").increment(1);
                tracing::warn!(
                    booking_id = %booking_id,
                    failure = "conflict",
                    rejected = response.rejected.len(),
                    "seats unavailable, compensating"
                );
                self.compensate(&record, &seat_ids, "seats unavailable").await;
                Err(BookingError::SeatsUnavailable {
                    seat_ids: response.rejected,
                })
            }
            Err(DeadlineError::Inner(InventoryError::ShowtimeNotFound(id))) => {
                // The ledger vanished between the read and the lock. Nothing
                // was locked; only the pending booking needs compensating.
                self.compensate(&record, &seat_ids, "showtime disappeared before lock")
                    .await;
                Err(BookingError::InvalidShowtime(id))
            }
            Err(err) => {
                // Timeout or transport failure: the outcome is unknown. The
                // lock may have landed, so release first, then compensate.
                metrics::counter!("booking.saga.rejected").increment(1);
                tracing::warn!(
                    booking_id = %booking_id,
                    failure = "transport",
                    error = %err,
                    "lock outcome unknown, releasing and compensating"
                );
                self.release_locks(request.showtime_id, seat_ids.clone(), booking_id)
                    .await;
                self.compensate(&record, &seat_ids, "lock outcome unknown").await;
                let mut seat_ids = seat_ids;
                seat_ids.sort_unstable();
                Err(BookingError::SeatsUnavailable { seat_ids })
            }
        }
    }

    /// Fetch a booking with its line items
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the record store fails.
    pub async fn get_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Option<BookingRecord>, BookingError> {
        Ok(self.store.get(booking_id).await?)
    }

    /// All bookings of a user, newest first
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the record store fails.
    pub async fn list_bookings_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<BookingRecord>, BookingError> {
        Ok(self.store.list_by_user(user_id).await?)
    }

    async fn fetch_showtime(&self, showtime_id: ShowtimeId) -> Result<Showtime, BookingError> {
        match with_deadline(
            self.config.get_showtime_timeout,
            self.inventory.get_showtime(showtime_id),
        )
        .await
        {
            Ok(showtime) => Ok(showtime),
            Err(DeadlineError::Inner(InventoryError::ShowtimeNotFound(id))) => {
                Err(BookingError::InvalidShowtime(id))
            }
            Err(err) => {
                tracing::warn!(
                    showtime_id = %showtime_id,
                    failure = "transport",
                    error = %err,
                    "showtime read failed before any side effect"
                );
                Err(BookingError::InventoryUnreachable(err.to_string()))
            }
        }
    }

    /// Resolve unit prices and collect the seat subset to lock
    fn build_line_items(
        &self,
        request: &CreateBookingRequest,
        showtime: &Showtime,
    ) -> Result<(Vec<LineItem>, Vec<SeatId>), BookingError> {
        let mut line_items = Vec::with_capacity(request.items.len());
        let mut seat_ids = Vec::new();

        for item in &request.items {
            match *item {
                OrderItem::Seat { seat_id } => {
                    line_items.push(LineItem::seat(seat_id, showtime.seat_price));
                    seat_ids.push(seat_id);
                }
                OrderItem::Product {
                    product_id,
                    quantity,
                } => {
                    let product = self
                        .products
                        .product_by_id(product_id)
                        .ok_or(BookingError::ProductNotFound(product_id))?;
                    line_items.push(LineItem::product(product_id, quantity, product.price));
                }
            }
        }

        Ok((line_items, seat_ids))
    }

    /// Resolve an idempotency-key hit against the existing booking
    async fn replay_existing(
        &self,
        existing: BookingId,
    ) -> Result<BookingRecord, BookingError> {
        match self.store.get(existing).await? {
            Some(record) if record.booking.status == BookingStatus::Pending => {
                // The original attempt is still in flight; the client must
                // wait for its outcome rather than fork a second saga.
                Err(BookingError::DuplicateRequest {
                    booking_id: existing,
                })
            }
            Some(record) => {
                tracing::info!(
                    booking_id = %existing,
                    status = record.booking.status.as_str(),
                    "idempotent replay, returning original booking"
                );
                Ok(record)
            }
            // The key points at a booking mid-deletion; treat as in flight.
            None => Err(BookingError::DuplicateRequest {
                booking_id: existing,
            }),
        }
    }

    /// Best-effort unlock after an unknown lock outcome, bounded by its own
    /// deadline. Failure here is logged only: the expiry sweep is the
    /// backstop.
    async fn release_locks(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) {
        match with_deadline(
            self.config.unlock_timeout,
            self.inventory.unlock_seats(showtime_id, seat_ids, booking_id),
        )
        .await
        {
            Ok(response) => {
                tracing::info!(
                    booking_id = %booking_id,
                    released = response.released.len(),
                    "released seats after unknown lock outcome"
                );
            }
            Err(err) => {
                tracing::warn!(
                    booking_id = %booking_id,
                    error = %err,
                    "best-effort unlock failed, expiry sweep will reclaim"
                );
            }
        }
    }

    /// The compensating action: delete the pending booking, retried with
    /// backoff, dead-lettered on exhaustion.
    async fn compensate(&self, record: &BookingRecord, seat_ids: &[SeatId], reason: &str) {
        metrics::counter!("booking.saga.compensated").increment(1);
        let booking_id = record.booking.id;

        let outcome = retry_with_backoff(self.config.compensation_retry, || {
            self.store.delete(booking_id)
        })
        .await;

        if let Err(err) = outcome {
            metrics::counter!("booking.compensation.dead_lettered").increment(1);
            tracing::error!(
                booking_id = %booking_id,
                reason,
                error = %err,
                "compensation exhausted retries, dead-lettering"
            );
            let letter = DeadLetter {
                booking_id,
                showtime_id: record.booking.showtime_id,
                seat_ids: seat_ids.to_vec(),
                reason: reason.to_owned(),
                error: err.to_string(),
                attempts: self.config.compensation_retry.max_retries + 1,
                failed_at: self.clock.now(),
            };
            if let Err(record_err) = self.dead_letters.record(letter).await {
                // Nothing further to fall back to; make the loss loud.
                tracing::error!(
                    booking_id = %booking_id,
                    error = %record_err,
                    "failed to record compensation dead letter"
                );
            }
        }
    }
}

fn validate_request(request: &CreateBookingRequest) -> Result<(), BookingError> {
    if request.items.is_empty() {
        return Err(BookingError::InvalidRequest {
            reason: "order has no items".to_owned(),
        });
    }

    let mut seen_seats = HashSet::new();
    for item in &request.items {
        match *item {
            OrderItem::Seat { seat_id } => {
                if !seen_seats.insert(seat_id) {
                    return Err(BookingError::InvalidRequest {
                        reason: format!("seat {seat_id} requested more than once"),
                    });
                }
            }
            OrderItem::Product { quantity, .. } => {
                if quantity == 0 {
                    return Err(BookingError::InvalidRequest {
                        reason: "product quantity must be at least 1".to_owned(),
                    });
                }
            }
        }
    }
    Ok(())
}
