//! Fault-injecting wrappers for the saga's collaborators.
//!
//! [`FlakyInventory`] decorates any [`InventoryApi`] implementation and lets
//! a test drop lock responses, refuse lock calls outright, or delay every
//! call past a deadline. [`FailingStore`] decorates a [`BookingStore`] and
//! fails a configured number of deletes, which is how compensation retries
//! and dead-lettering get exercised.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use marquee_core::inventory::{InventoryApi, InventoryError, LockResponse, UnlockResponse};
use marquee_core::store::{BookingRecord, BookingStore, CreatePending, StoreError};
use marquee_core::types::{BookingId, IdempotencyKey, SeatId, Showtime, ShowtimeId, UserId};

/// An unlock call observed by [`FlakyInventory`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnlockCall {
    /// Showtime the unlock targeted
    pub showtime_id: ShowtimeId,
    /// Seats the caller asked to release
    pub seat_ids: Vec<SeatId>,
    /// Booking the caller released on behalf of
    pub booking_id: BookingId,
}

/// Fault-injecting wrapper around an inventory implementation.
///
/// Faults are consumed in order of configuration: a refused lock never
/// reaches the inner service, a lost lock response reaches it (the seats DO
/// get locked) but the caller sees a transport error — the exact shape of a
/// timed-out call whose outcome is unknown.
pub struct FlakyInventory {
    inner: Arc<dyn InventoryApi>,
    refuse_locks: AtomicUsize,
    lose_lock_responses: AtomicUsize,
    latency: Option<Duration>,
    unlock_calls: Mutex<Vec<UnlockCall>>,
}

impl FlakyInventory {
    /// Wrap an inventory implementation with no faults configured
    #[must_use]
    pub fn new(inner: Arc<dyn InventoryApi>) -> Self {
        Self {
            inner,
            refuse_locks: AtomicUsize::new(0),
            lose_lock_responses: AtomicUsize::new(0),
            latency: None,
            unlock_calls: Mutex::new(Vec::new()),
        }
    }

    /// Refuse the next `n` lock calls with a transport error before they
    /// reach the inner service (nothing gets locked)
    #[must_use]
    pub fn refuse_next_locks(self, n: usize) -> Self {
        self.refuse_locks.store(n, Ordering::SeqCst);
        self
    }

    /// Let the next `n` lock calls reach the inner service but report a
    /// transport error to the caller (seats locked, response lost)
    #[must_use]
    pub fn lose_next_lock_responses(self, n: usize) -> Self {
        self.lose_lock_responses.store(n, Ordering::SeqCst);
        self
    }

    /// Delay every call by `latency`, for forcing deadline expiry
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every unlock call observed so far
    #[must_use]
    pub fn unlock_calls(&self) -> Vec<UnlockCall> {
        self.unlock_calls.lock().unwrap().clone()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_fault(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl InventoryApi for FlakyInventory {
    fn get_showtime(
        &self,
        showtime_id: ShowtimeId,
    ) -> Pin<Box<dyn Future<Output = Result<Showtime, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            self.delay().await;
            self.inner.get_showtime(showtime_id).await
        })
    }

    fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<LockResponse, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            self.delay().await;
            if Self::take_fault(&self.refuse_locks) {
                return Err(InventoryError::Transport(
                    "injected: lock refused before delivery".to_owned(),
                ));
            }
            if Self::take_fault(&self.lose_lock_responses) {
                let _ = self
                    .inner
                    .lock_seats(showtime_id, seat_ids, booking_id)
                    .await;
                return Err(InventoryError::Transport(
                    "injected: lock response lost".to_owned(),
                ));
            }
            self.inner.lock_seats(showtime_id, seat_ids, booking_id).await
        })
    }

    fn unlock_seats(
        &self,
        showtime_id: ShowtimeId,
        seat_ids: Vec<SeatId>,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<UnlockResponse, InventoryError>> + Send + '_>> {
        Box::pin(async move {
            self.delay().await;
            self.unlock_calls.lock().unwrap().push(UnlockCall {
                showtime_id,
                seat_ids: seat_ids.clone(),
                booking_id,
            });
            self.inner
                .unlock_seats(showtime_id, seat_ids, booking_id)
                .await
        })
    }
}

/// Record store wrapper whose deletes fail a configured number of times.
///
/// All other operations pass straight through to the inner store.
pub struct FailingStore {
    inner: Arc<dyn BookingStore>,
    failing_deletes: AtomicUsize,
    delete_attempts: AtomicUsize,
}

impl FailingStore {
    /// Wrap a store; the first `failing_deletes` delete calls return a
    /// backend error
    #[must_use]
    pub fn new(inner: Arc<dyn BookingStore>, failing_deletes: usize) -> Self {
        Self {
            inner,
            failing_deletes: AtomicUsize::new(failing_deletes),
            delete_attempts: AtomicUsize::new(0),
        }
    }

    /// How many delete calls were attempted (failed or not)
    #[must_use]
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

impl BookingStore for FailingStore {
    fn create_pending(
        &self,
        record: BookingRecord,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Pin<Box<dyn Future<Output = Result<CreatePending, StoreError>> + Send + '_>> {
        self.inner.create_pending(record, idempotency_key)
    }

    fn confirm(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        self.inner.confirm(booking_id)
    }

    fn delete(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.delete_attempts.fetch_add(1, Ordering::SeqCst);
            let should_fail = self
                .failing_deletes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(StoreError::Backend(
                    "injected: delete unavailable".to_owned(),
                ));
            }
            self.inner.delete(booking_id).await
        })
    }

    fn get(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BookingRecord>, StoreError>> + Send + '_>> {
        self.inner.get(booking_id)
    }

    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BookingRecord>, StoreError>> + Send + '_>> {
        self.inner.list_by_user(user_id)
    }
}
