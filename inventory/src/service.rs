//! In-process inventory service.
//!
//! Owns one [`ShowtimeLedger`] per showtime behind a per-showtime
//! `tokio::sync::Mutex` and implements the remote contract
//! ([`InventoryApi`]). The mutex is the critical section the saga's
//! correctness rests on: two lock calls contending for the same seat are
//! serialized here, so they cannot both observe it available. Locks for
//! different showtimes proceed independently.
//!
//! Besides the three remote operations, the service carries the local
//! administrative surface the surrounding subsystems need:
//! [`InventoryService::register_showtime`] (what the catalog does at
//! showtime creation), [`InventoryService::mark_booked`] (the payment flow's
//! primitive), and [`InventoryService::release_expired`] (the reconciliation
//! sweep's primitive).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use marquee_core::environment::Clock;
use marquee_core::inventory::{InventoryApi, InventoryError, LockResponse, UnlockResponse};
use marquee_core::types::{BookingId, SeatId, Showtime, ShowtimeId};

use crate::ledger::ShowtimeLedger;

/// Failure of the local `mark_booked` pass-through
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BookedTransitionError {
    /// The showtime has no ledger
    #[error("showtime {0} not found")]
    ShowtimeNotFound(ShowtimeId),

    /// Some seats were not locked by the booking; nothing was promoted
    #[error("{} seats were not locked by the booking", rejected.len())]
    Rejected {
        /// The offending seats, sorted
        rejected: Vec<SeatId>,
    },
}

/// The inventory service: seat ledgers behind per-showtime mutexes
pub struct InventoryService {
    clock: Arc<dyn Clock>,
    ledgers: RwLock<HashMap<ShowtimeId, Arc<Mutex<ShowtimeLedger>>>>,
}

impl InventoryService {
    /// Create a service with no showtimes registered
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ledgers: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self::new(clock))
    }

    /// Materialize the seat ledger for a showtime, every seat available.
    ///
    /// This is the write the catalog subsystem performs at showtime-creation
    /// time. Returns `false` (and leaves the existing ledger untouched) if
    /// the showtime is already registered — a live ledger is never replaced.
    pub async fn register_showtime(
        &self,
        showtime: Showtime,
        seat_ids: Vec<SeatId>,
    ) -> bool {
        let mut ledgers = self.ledgers.write().await;
        if ledgers.contains_key(&showtime.id) {
            tracing::warn!(showtime_id = %showtime.id, "showtime already registered, keeping existing ledger");
            return false;
        }
        let showtime_id = showtime.id;
        let seat_count = seat_ids.len();
        ledgers.insert(
            showtime_id,
            Arc::new(Mutex::new(ShowtimeLedger::new(showtime, seat_ids))),
        );
        tracing::info!(showtime_id = %showtime_id, seats = seat_count, "showtime registered");
        true
    }

    /// Promote locked seats to booked for the holding booking.
    ///
    /// Local surface for the (out-of-scope) payment flow; not part of the
    /// remote contract. All-or-nothing and holder-guarded like the lock.
    ///
    /// # Errors
    ///
    /// Returns [`BookedTransitionError`] if the showtime is unknown or any
    /// seat was not locked by the booking.
    pub async fn mark_booked(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Result<Vec<SeatId>, BookedTransitionError> {
        let ledger = self
            .ledger(showtime_id)
            .await
            .ok_or(BookedTransitionError::ShowtimeNotFound(showtime_id))?;
        let mut ledger = ledger.lock().await;
        ledger
            .mark_booked(&seat_ids, booking_id)
            .map_err(|err| BookedTransitionError::Rejected {
                rejected: err.rejected,
            })
    }

    /// Release every lock older than `ttl` across all showtimes.
    ///
    /// The primitive underneath the periodic reconciliation sweep; the
    /// scheduler itself lives outside this crate. Returns the released
    /// seats per showtime (showtimes with nothing to release are omitted).
    pub async fn release_expired(&self, ttl: Duration) -> Vec<(ShowtimeId, Vec<SeatId>)> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();

        let ledgers: Vec<(ShowtimeId, Arc<Mutex<ShowtimeLedger>>)> = {
            let map = self.ledgers.read().await;
            map.iter().map(|(id, ledger)| (*id, Arc::clone(ledger))).collect()
        };

        let mut swept = Vec::new();
        for (showtime_id, ledger) in ledgers {
            let released = ledger.lock().await.release_expired(ttl, now);
            if !released.is_empty() {
                metrics::counter!("inventory.lock.expired").increment(released.len() as u64);
                tracing::info!(
                    showtime_id = %showtime_id,
                    released = released.len(),
                    "expired seat locks released"
                );
                swept.push((showtime_id, released));
            }
        }
        swept
    }

    async fn ledger(&self, showtime_id: ShowtimeId) -> Option<Arc<Mutex<ShowtimeLedger>>> {
        self.ledgers.read().await.get(&showtime_id).cloned()
    }
}

impl InventoryApi for InventoryService {
    fn get_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> Pin<Box<dyn Future<Output = Result<Showtime, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            let ledger = self
                .ledger(showtime_id)
                .await
                .ok_or(InventoryError::ShowtimeNotFound(showtime_id))?;
            let ledger = ledger.lock().await;
            Ok(ledger.showtime().clone())
        })
    }

    fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<LockResponse, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            let ledger = self
                .ledger(showtime_id)
                .await
                .ok_or(InventoryError::ShowtimeNotFound(showtime_id))?;

            // The availability check and the mutation happen under one
            // ledger lock: this is the atomic unit of the whole design.
            let mut ledger = ledger.lock().await;
            let response = ledger.lock_batch(&seat_ids, booking_id, self.clock.now());

            if response.all_locked() {
                metrics::counter!("inventory.lock.granted")
                    .increment(response.locked.len() as u64);
                tracing::debug!(
                    showtime_id = %showtime_id,
                    booking_id = %booking_id,
                    seats = response.locked.len(),
                    "seat batch locked"
                );
            } else {
                metrics::counter!("inventory.lock.rejected").increment(1);
                tracing::info!(
                    showtime_id = %showtime_id,
                    booking_id = %booking_id,
                    rejected = response.rejected.len(),
                    "seat batch rejected, no seats locked"
                );
            }
            Ok(response)
        })
    }

    fn unlock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<UnlockResponse, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            // Unknown showtime is a no-op, not an error: unlock always
            // succeeds so compensation can be retried blindly.
            let Some(ledger) = self.ledger(showtime_id).await else {
                tracing::debug!(showtime_id = %showtime_id, "unlock for unknown showtime, nothing to release");
                return Ok(UnlockResponse { released: Vec::new() });
            };

            let mut ledger = ledger.lock().await;
            let released = ledger.unlock(&seat_ids, booking_id);

            if !released.is_empty() {
                metrics::counter!("inventory.unlock.released").increment(released.len() as u64);
            }
            tracing::debug!(
                showtime_id = %showtime_id,
                booking_id = %booking_id,
                released = released.len(),
                "seats released"
            );
            Ok(UnlockResponse { released })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marquee_core::types::{Currency, Money, RoomId};
    use marquee_testing::test_clock;

    fn showtime() -> Showtime {
        let now = test_clock().now();
        Showtime {
            id: ShowtimeId::new(),
            room_id: RoomId::new(),
            starts_at: now + chrono::Duration::hours(2),
            ends_at: now + chrono::Duration::hours(4),
            seat_price: Money::from_minor(100_000),
            currency: Currency::new("VND"),
        }
    }

    async fn service_with_seats(count: usize) -> (Arc<InventoryService>, ShowtimeId, Vec<SeatId>) {
        let service = InventoryService::shared(Arc::new(test_clock()));
        let showtime = showtime();
        let showtime_id = showtime.id;
        let seats: Vec<SeatId> = (0..count).map(|_| SeatId::new()).collect();
        assert!(service.register_showtime(showtime, seats.clone()).await);
        (service, showtime_id, seats)
    }

    #[tokio::test]
    async fn get_showtime_round_trips() {
        let service = InventoryService::shared(Arc::new(test_clock()));
        let showtime = showtime();
        service
            .register_showtime(showtime.clone(), vec![SeatId::new()])
            .await;

        let fetched = service.get_showtime(showtime.id).await.unwrap();
        assert_eq!(fetched, showtime);

        let missing = service.get_showtime(ShowtimeId::new()).await;
        assert!(matches!(missing, Err(InventoryError::ShowtimeNotFound(_))));
    }

    #[tokio::test]
    async fn lock_on_unknown_showtime_is_not_found() {
        let service = InventoryService::shared(Arc::new(test_clock()));
        let result = service
            .lock_seats(ShowtimeId::new(), vec![SeatId::new()], BookingId::new())
            .await;
        assert!(matches!(result, Err(InventoryError::ShowtimeNotFound(_))));
    }

    #[tokio::test]
    async fn unlock_on_unknown_showtime_releases_nothing() {
        let service = InventoryService::shared(Arc::new(test_clock()));
        let response = service
            .unlock_seats(ShowtimeId::new(), vec![SeatId::new()], BookingId::new())
            .await
            .unwrap();
        assert!(response.released.is_empty());
    }

    #[tokio::test]
    async fn registering_twice_keeps_the_live_ledger() {
        let (service, showtime_id, seats) = service_with_seats(1).await;
        let booking = BookingId::new();
        service
            .lock_seats(showtime_id, seats.clone(), booking)
            .await
            .unwrap();

        // A duplicate registration must not wipe the existing lock.
        let mut replacement = showtime();
        replacement.id = showtime_id;
        assert!(!service.register_showtime(replacement, seats.clone()).await);

        let retry = service
            .lock_seats(showtime_id, seats, BookingId::new())
            .await
            .unwrap();
        assert!(!retry.all_locked());
    }

    #[tokio::test]
    async fn mark_booked_requires_the_holder() {
        let (service, showtime_id, seats) = service_with_seats(2).await;
        let booking = BookingId::new();
        service
            .lock_seats(showtime_id, seats.clone(), booking)
            .await
            .unwrap();

        let err = service
            .mark_booked(showtime_id, seats.clone(), BookingId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BookedTransitionError::Rejected { .. }));

        let booked = service
            .mark_booked(showtime_id, seats.clone(), booking)
            .await
            .unwrap();
        assert_eq!(booked.len(), seats.len());
    }

    #[tokio::test]
    async fn expiry_sweep_reclaims_stale_locks() {
        let clock = Arc::new(marquee_testing::StepClock::new(test_clock().now()));
        let service = InventoryService::shared(Arc::clone(&clock) as Arc<dyn Clock>);
        let showtime = showtime();
        let showtime_id = showtime.id;
        let seat = SeatId::new();
        service.register_showtime(showtime, vec![seat]).await;

        service
            .lock_seats(showtime_id, vec![seat], BookingId::new())
            .await
            .unwrap();

        // Within the TTL the lock is kept.
        clock.advance(chrono::Duration::minutes(9));
        assert!(service.release_expired(Duration::from_secs(600)).await.is_empty());

        // Past the TTL the sweep frees it.
        clock.advance(chrono::Duration::minutes(2));
        let swept = service.release_expired(Duration::from_secs(600)).await;
        assert_eq!(swept, vec![(showtime_id, vec![seat])]);

        let retry = service
            .lock_seats(showtime_id, vec![seat], BookingId::new())
            .await
            .unwrap();
        assert!(retry.all_locked());
    }
}
