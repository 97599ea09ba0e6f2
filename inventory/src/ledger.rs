//! Per-showtime seat ledger: the reservation state machine.
//!
//! One ledger entry exists per seat of a showtime and cycles through
//! `Available → Locked → Booked`, with `Locked → Available` as the only
//! reverse edge (compensation release and lock expiry). The holder booking
//! id lives inside the state, so "locked without a holder" is not
//! representable.
//!
//! All batch transitions are validate-then-apply: the whole batch is checked
//! before any entry is mutated, which is what makes `lock_batch` and
//! `mark_booked` all-or-nothing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use smallvec::SmallVec;
use thiserror::Error;

use marquee_core::inventory::LockResponse;
use marquee_core::types::{BookingId, SeatId, Showtime};

// Most bookings lock a handful of seats; spill to the heap past that.
type SeatBuf = SmallVec<[SeatId; 8]>;

/// Reservation state of one seat
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatState {
    /// Free to be locked by any booking
    Available,
    /// Held by a booking pending confirmation
    Locked {
        /// The booking holding the seat
        holder: BookingId,
        /// When the hold was taken, for expiry sweeps
        locked_at: DateTime<Utc>,
    },
    /// Sold; terminal for the lifetime of the showtime
    Booked {
        /// The booking the seat was sold to
        holder: BookingId,
    },
}

impl SeatState {
    /// The booking currently holding the seat, if any
    #[must_use]
    pub const fn holder(&self) -> Option<BookingId> {
        match self {
            Self::Available => None,
            Self::Locked { holder, .. } | Self::Booked { holder } => Some(*holder),
        }
    }

    /// Whether the seat can be locked
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// A `mark_booked` batch that could not be applied.
///
/// Mirrors the lock rule: any seat not `Locked` by the given booking fails
/// the whole batch, and nothing is mutated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{} seats were not locked by the booking", rejected.len())]
pub struct MarkBookedError {
    /// Seats that were not held by the booking (sorted)
    pub rejected: Vec<SeatId>,
}

/// The seat ledger of one showtime.
///
/// Pure state machine: callers provide `now`, and serialization of
/// concurrent access is the owning service's job.
#[derive(Clone, Debug)]
pub struct ShowtimeLedger {
    showtime: Showtime,
    seats: HashMap<SeatId, SeatState>,
}

impl ShowtimeLedger {
    /// Materialize a ledger with every seat `Available`
    #[must_use]
    pub fn new(showtime: Showtime, seat_ids: impl IntoIterator<Item = SeatId>) -> Self {
        Self {
            showtime,
            seats: seat_ids
                .into_iter()
                .map(|seat| (seat, SeatState::Available))
                .collect(),
        }
    }

    /// The showtime this ledger belongs to
    #[must_use]
    pub const fn showtime(&self) -> &Showtime {
        &self.showtime
    }

    /// State of one seat, or `None` for a seat with no ledger entry
    #[must_use]
    pub fn seat_state(&self, seat_id: SeatId) -> Option<&SeatState> {
        self.seats.get(&seat_id)
    }

    /// The booking holding a seat, if the seat exists and is held
    #[must_use]
    pub fn holder_of(&self, seat_id: SeatId) -> Option<BookingId> {
        self.seats.get(&seat_id).and_then(SeatState::holder)
    }

    /// Number of seats currently available
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.seats
            .values()
            .filter(|state| state.is_available())
            .count()
    }

    /// Atomically lock a batch of seats for `booking_id`.
    ///
    /// All-or-nothing: if any requested seat is missing or not `Available`,
    /// no seat is locked and the response's `rejected` set names the
    /// contested ones. Both response sets are sorted.
    pub fn lock_batch(
        &mut self,
        seat_ids: &[SeatId],
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> LockResponse {
        let rejected: SeatBuf = seat_ids
            .iter()
            .copied()
            .filter(|seat| {
                !self
                    .seats
                    .get(seat)
                    .is_some_and(SeatState::is_available)
            })
            .collect();

        if !rejected.is_empty() {
            let mut rejected = rejected.into_vec();
            rejected.sort_unstable();
            rejected.dedup();
            return LockResponse {
                locked: Vec::new(),
                rejected,
            };
        }

        for seat in seat_ids {
            self.seats.insert(
                *seat,
                SeatState::Locked {
                    holder: booking_id,
                    locked_at: now,
                },
            );
        }

        let mut locked = seat_ids.to_vec();
        locked.sort_unstable();
        locked.dedup();
        LockResponse {
            locked,
            rejected: Vec::new(),
        }
    }

    /// Release seats held by `booking_id` back to `Available`.
    ///
    /// Idempotent: seats that are missing, already available, booked, or
    /// held by a different booking are skipped without error. Returns the
    /// seats actually released, sorted.
    pub fn unlock(&mut self, seat_ids: &[SeatId], booking_id: BookingId) -> Vec<SeatId> {
        let mut released = Vec::new();
        for seat in seat_ids {
            if let Some(state) = self.seats.get_mut(seat)
                && matches!(state, SeatState::Locked { holder, .. } if *holder == booking_id)
            {
                *state = SeatState::Available;
                released.push(*seat);
            }
        }
        released.sort_unstable();
        released
    }

    /// Promote locked seats to `Booked` for the holding booking.
    ///
    /// All-or-nothing, holder-guarded: any seat not `Locked` by
    /// `booking_id` fails the whole batch with no mutation.
    ///
    /// # Errors
    ///
    /// Returns [`MarkBookedError`] naming the seats that were not held by
    /// the booking.
    pub fn mark_booked(
        &mut self,
        seat_ids: &[SeatId],
        booking_id: BookingId,
    ) -> Result<Vec<SeatId>, MarkBookedError> {
        let rejected: SeatBuf = seat_ids
            .iter()
            .copied()
            .filter(|seat| {
                !matches!(
                    self.seats.get(seat),
                    Some(SeatState::Locked { holder, .. }) if *holder == booking_id
                )
            })
            .collect();

        if !rejected.is_empty() {
            let mut rejected = rejected.into_vec();
            rejected.sort_unstable();
            rejected.dedup();
            return Err(MarkBookedError { rejected });
        }

        for seat in seat_ids {
            self.seats
                .insert(*seat, SeatState::Booked { holder: booking_id });
        }

        let mut booked = seat_ids.to_vec();
        booked.sort_unstable();
        booked.dedup();
        Ok(booked)
    }

    /// Release every lock older than `ttl` back to `Available`.
    ///
    /// `Booked` seats are never touched. Returns the released seats, sorted.
    pub fn release_expired(&mut self, ttl: Duration, now: DateTime<Utc>) -> Vec<SeatId> {
        let mut released = Vec::new();
        for (seat, state) in &mut self.seats {
            if let SeatState::Locked { locked_at, .. } = state
                && *locked_at + ttl < now
            {
                *state = SeatState::Available;
                released.push(*seat);
            }
        }
        released.sort_unstable();
        released
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marquee_core::types::{Currency, Money, RoomId, ShowtimeId};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap()
    }

    fn showtime() -> Showtime {
        Showtime {
            id: ShowtimeId::new(),
            room_id: RoomId::new(),
            starts_at: now() + Duration::hours(2),
            ends_at: now() + Duration::hours(4),
            seat_price: Money::from_minor(100_000),
            currency: Currency::new("VND"),
        }
    }

    fn ledger_with(seats: &[SeatId]) -> ShowtimeLedger {
        ShowtimeLedger::new(showtime(), seats.iter().copied())
    }

    #[test]
    fn lock_attaches_holder_and_timestamp() {
        let seats = [SeatId::new(), SeatId::new()];
        let mut ledger = ledger_with(&seats);
        let booking = BookingId::new();

        let response = ledger.lock_batch(&seats, booking, now());

        assert!(response.all_locked());
        assert_eq!(response.locked.len(), 2);
        for seat in &seats {
            assert_eq!(
                ledger.seat_state(*seat),
                Some(&SeatState::Locked {
                    holder: booking,
                    locked_at: now()
                })
            );
        }
    }

    #[test]
    fn lock_batch_is_all_or_nothing() {
        let free = SeatId::new();
        let contested = SeatId::new();
        let mut ledger = ledger_with(&[free, contested]);
        let first = BookingId::new();
        let second = BookingId::new();

        assert!(ledger.lock_batch(&[contested], first, now()).all_locked());

        // Second booking wants both; the contested seat fails the batch.
        let response = ledger.lock_batch(&[free, contested], second, now());
        assert_eq!(response.locked, Vec::<SeatId>::new());
        assert_eq!(response.rejected, vec![contested]);

        // The free seat must not have been touched by the failed batch.
        assert_eq!(ledger.seat_state(free), Some(&SeatState::Available));
        assert_eq!(ledger.holder_of(contested), Some(first));
    }

    #[test]
    fn unknown_seat_rejects_the_batch() {
        let known = SeatId::new();
        let mut ledger = ledger_with(&[known]);

        let phantom = SeatId::new();
        let response = ledger.lock_batch(&[known, phantom], BookingId::new(), now());

        assert_eq!(response.rejected, vec![phantom]);
        assert_eq!(ledger.seat_state(known), Some(&SeatState::Available));
    }

    #[test]
    fn unlock_requires_matching_holder() {
        let seat = SeatId::new();
        let mut ledger = ledger_with(&[seat]);
        let holder = BookingId::new();
        ledger.lock_batch(&[seat], holder, now());

        // A different booking cannot release the seat.
        assert_eq!(ledger.unlock(&[seat], BookingId::new()), Vec::new());
        assert_eq!(ledger.holder_of(seat), Some(holder));

        assert_eq!(ledger.unlock(&[seat], holder), vec![seat]);
        assert_eq!(ledger.seat_state(seat), Some(&SeatState::Available));
    }

    #[test]
    fn unlock_is_idempotent() {
        let seat = SeatId::new();
        let mut ledger = ledger_with(&[seat]);
        let booking = BookingId::new();
        ledger.lock_batch(&[seat], booking, now());

        assert_eq!(ledger.unlock(&[seat], booking), vec![seat]);
        // Second release of the same seats is a no-op, same final state.
        assert_eq!(ledger.unlock(&[seat], booking), Vec::new());
        assert_eq!(ledger.seat_state(seat), Some(&SeatState::Available));
    }

    #[test]
    fn unlock_never_touches_booked_seats() {
        let seat = SeatId::new();
        let mut ledger = ledger_with(&[seat]);
        let booking = BookingId::new();
        ledger.lock_batch(&[seat], booking, now());
        ledger.mark_booked(&[seat], booking).unwrap();

        assert_eq!(ledger.unlock(&[seat], booking), Vec::new());
        assert_eq!(ledger.seat_state(seat), Some(&SeatState::Booked { holder: booking }));
    }

    #[test]
    fn mark_booked_is_holder_guarded_and_atomic() {
        let held = SeatId::new();
        let free = SeatId::new();
        let mut ledger = ledger_with(&[held, free]);
        let booking = BookingId::new();
        ledger.lock_batch(&[held], booking, now());

        let err = ledger.mark_booked(&[held, free], booking).unwrap_err();
        assert_eq!(err.rejected, vec![free]);
        // The held seat stays locked; nothing was promoted.
        assert!(matches!(
            ledger.seat_state(held),
            Some(SeatState::Locked { .. })
        ));

        assert_eq!(ledger.mark_booked(&[held], booking), Ok(vec![held]));
    }

    #[test]
    fn release_expired_frees_only_stale_locks() {
        let stale = SeatId::new();
        let fresh = SeatId::new();
        let sold = SeatId::new();
        let mut ledger = ledger_with(&[stale, fresh, sold]);
        let booking = BookingId::new();

        ledger.lock_batch(&[stale, sold], booking, now());
        ledger.mark_booked(&[sold], booking).unwrap();
        ledger.lock_batch(&[fresh], booking, now() + Duration::minutes(9));

        let released = ledger.release_expired(Duration::minutes(10), now() + Duration::minutes(11));

        assert_eq!(released, vec![stale]);
        assert_eq!(ledger.seat_state(stale), Some(&SeatState::Available));
        assert!(matches!(
            ledger.seat_state(fresh),
            Some(SeatState::Locked { .. })
        ));
        assert_eq!(ledger.seat_state(sold), Some(&SeatState::Booked { holder: booking }));
    }

    proptest! {
        /// Two bookings racing for overlapping subsets of one showtime can
        /// never both hold the same seat, and releasing every lock restores
        /// full availability.
        #[test]
        fn no_seat_ever_has_two_holders(
            seat_count in 1usize..24,
            picks_a in prop::collection::vec(any::<prop::sample::Index>(), 1..12),
            picks_b in prop::collection::vec(any::<prop::sample::Index>(), 1..12),
        ) {
            let seats: Vec<SeatId> = (0..seat_count).map(|_| SeatId::new()).collect();
            let mut set_a: Vec<SeatId> = picks_a.iter().map(|i| seats[i.index(seat_count)]).collect();
            let mut set_b: Vec<SeatId> = picks_b.iter().map(|i| seats[i.index(seat_count)]).collect();
            set_a.sort_unstable();
            set_a.dedup();
            set_b.sort_unstable();
            set_b.dedup();

            let mut ledger = ShowtimeLedger::new(showtime(), seats.iter().copied());
            let booking_a = BookingId::new();
            let booking_b = BookingId::new();

            let response_a = ledger.lock_batch(&set_a, booking_a, now());
            let response_b = ledger.lock_batch(&set_b, booking_b, now());

            // A batch either locked everything it asked for or nothing.
            prop_assert!(response_a.all_locked());
            let overlaps = set_b.iter().any(|seat| set_a.contains(seat));
            prop_assert_eq!(response_b.all_locked(), !overlaps);

            for seat in &seats {
                let held_by_a = response_a.all_locked() && set_a.contains(seat);
                let held_by_b = response_b.all_locked() && set_b.contains(seat);
                prop_assert!(!(held_by_a && held_by_b));
                let expected = if held_by_a {
                    Some(booking_a)
                } else if held_by_b {
                    Some(booking_b)
                } else {
                    None
                };
                prop_assert_eq!(ledger.holder_of(*seat), expected);
            }

            // Full release restores every seat.
            ledger.unlock(&set_a, booking_a);
            ledger.unlock(&set_b, booking_b);
            prop_assert_eq!(ledger.available_count(), seat_count);
        }
    }
}
