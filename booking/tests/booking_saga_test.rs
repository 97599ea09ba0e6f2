//! End-to-end saga tests over the real in-process inventory service.
//!
//! Each test wires a full orchestrator (inventory, catalogs, pricing engine,
//! record store, dead-letter sink) and drives it through one of the saga's
//! outcomes: confirmation, conflict, validation rejection, unknown lock
//! outcome, and compensation exhaustion. Fault injection comes from the
//! `marquee-testing` doubles, never from sleeping on real services.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;

use marquee_booking::{
    BookingError, BookingOrchestrator, MemoryBookingStore, MemoryDeadLetters, OrchestratorConfig,
};
use marquee_core::dead_letter::CompensationDeadLetters;
use marquee_core::environment::Clock;
use marquee_core::inventory::InventoryApi;
use marquee_core::store::{BookingRecord, BookingStore, CreatePending};
use marquee_core::types::{
    Booking, BookingId, BookingStatus, CreateBookingRequest, Currency, DiscountTerms,
    IdempotencyKey, LineItem, Money, OrderItem, Product, ProductId, Promotion, PromotionId,
    RoomId, SeatId, Showtime, ShowtimeId, UserId,
};
use marquee_inventory::InventoryService;
use marquee_pricing::{PricingEngine, PromotionRejection};
use marquee_runtime::retry::RetryPolicy;
use marquee_testing::{
    FailingStore, FixedClock, FlakyInventory, InMemoryProductCatalog, InMemoryPromotionCatalog,
    init_test_tracing, test_clock,
};

const SEAT_PRICE: Money = Money::from_minor(100_000);
const POPCORN_PRICE: Money = Money::from_minor(25_000);

struct World {
    service: Arc<InventoryService>,
    store: Arc<MemoryBookingStore>,
    dead_letters: Arc<MemoryDeadLetters>,
    products: Arc<InMemoryProductCatalog>,
    promotions: Arc<InMemoryPromotionCatalog>,
    clock: Arc<FixedClock>,
    showtime_id: ShowtimeId,
    seats: Vec<SeatId>,
    popcorn: Product,
}

async fn world(seat_count: usize) -> World {
    init_test_tracing();
    let clock = Arc::new(test_clock());
    let now = clock.now();

    let service = InventoryService::shared(Arc::clone(&clock) as Arc<dyn Clock>);
    let showtime = Showtime {
        id: ShowtimeId::new(),
        room_id: RoomId::new(),
        starts_at: now + chrono::Duration::hours(2),
        ends_at: now + chrono::Duration::hours(4),
        seat_price: SEAT_PRICE,
        currency: Currency::new("VND"),
    };
    let showtime_id = showtime.id;
    let seats: Vec<SeatId> = (0..seat_count).map(|_| SeatId::new()).collect();
    assert!(service.register_showtime(showtime, seats.clone()).await);

    let popcorn = Product {
        id: ProductId::new(),
        name: "Popcorn".to_owned(),
        price: POPCORN_PRICE,
    };
    let products = Arc::new(InMemoryProductCatalog::with_products(vec![popcorn.clone()]));
    let promotions = Arc::new(InMemoryPromotionCatalog::with_promotions(vec![
        Promotion {
            id: PromotionId::new(),
            code: "MOVIENIGHT".to_owned(),
            terms: DiscountTerms::Percentage { percent: 10 },
            starts_at: now - chrono::Duration::days(1),
            ends_at: now + chrono::Duration::days(30),
            minimum_order: None,
            active: true,
        },
        Promotion {
            id: PromotionId::new(),
            code: "LASTSUMMER".to_owned(),
            terms: DiscountTerms::Percentage { percent: 50 },
            starts_at: now - chrono::Duration::days(90),
            ends_at: now - chrono::Duration::days(30),
            minimum_order: None,
            active: true,
        },
    ]));

    World {
        service,
        store: MemoryBookingStore::shared(),
        dead_letters: MemoryDeadLetters::shared(),
        products,
        promotions,
        clock,
        showtime_id,
        seats,
        popcorn,
    }
}

fn fast_compensation() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

impl World {
    /// Orchestrator talking straight to the real inventory service
    fn orchestrator(&self) -> BookingOrchestrator {
        self.orchestrator_with(
            Arc::clone(&self.service) as Arc<dyn InventoryApi>,
            Arc::clone(&self.store) as Arc<dyn BookingStore>,
            OrchestratorConfig {
                compensation_retry: fast_compensation(),
                ..OrchestratorConfig::default()
            },
        )
    }

    fn orchestrator_with(
        &self,
        inventory: Arc<dyn InventoryApi>,
        store: Arc<dyn BookingStore>,
        config: OrchestratorConfig,
    ) -> BookingOrchestrator {
        BookingOrchestrator::new(
            inventory,
            Arc::clone(&self.products) as _,
            PricingEngine::new(
                Arc::clone(&self.promotions) as _,
                Arc::clone(&self.clock) as Arc<dyn Clock>,
            ),
            store,
            Arc::clone(&self.dead_letters) as Arc<dyn CompensationDeadLetters>,
            Arc::clone(&self.clock) as Arc<dyn Clock>,
            config,
        )
    }

    fn request(&self, items: Vec<OrderItem>) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: UserId::new(),
            showtime_id: self.showtime_id,
            promotion_code: None,
            items,
            idempotency_key: None,
        }
    }

    fn seat_items(&self) -> Vec<OrderItem> {
        self.seats
            .iter()
            .map(|&seat_id| OrderItem::Seat { seat_id })
            .collect()
    }
}

#[tokio::test]
async fn confirmed_booking_holds_its_seats_and_prices_the_order() {
    let world = world(2).await;
    let orchestrator = world.orchestrator();

    let mut request = world.request(world.seat_items());
    request.promotion_code = Some("MOVIENIGHT".to_owned());

    let record = orchestrator.create_booking(request).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Confirmed);
    assert_eq!(record.booking.subtotal, Money::from_minor(200_000));
    assert_eq!(record.booking.discount, Money::from_minor(20_000));
    assert_eq!(record.booking.total, Money::from_minor(180_000));
    assert!(record.booking.promotion_id.is_some());
    assert_eq!(record.line_items.len(), 2);

    let stored = world.store.get(record.booking.id).await.unwrap().unwrap();
    assert_eq!(stored.booking.status, BookingStatus::Confirmed);

    // The seats are held by the confirmed booking; a second attempt loses.
    let retry = orchestrator.create_booking(world.request(world.seat_items())).await;
    assert!(matches!(retry, Err(BookingError::SeatsUnavailable { .. })));
    assert_eq!(world.store.len().await, 1);
}

#[tokio::test]
async fn concessions_only_booking_confirms_without_locking() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();

    let record = orchestrator
        .create_booking(world.request(vec![OrderItem::Product {
            product_id: world.popcorn.id,
            quantity: 2,
        }]))
        .await
        .unwrap();

    assert_eq!(record.booking.status, BookingStatus::Confirmed);
    assert_eq!(record.booking.total, Money::from_minor(50_000));

    // No seat was touched: the whole row is still lockable.
    let lock = world
        .service
        .lock_seats(world.showtime_id, world.seats.clone(), BookingId::new())
        .await
        .unwrap();
    assert!(lock.all_locked());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contested_seat_confirms_exactly_one_booking() {
    let world = world(1).await;
    let orchestrator = Arc::new(world.orchestrator());
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let orchestrator = Arc::clone(&orchestrator);
        let barrier = Arc::clone(&barrier);
        let request = world.request(world.seat_items());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            orchestrator.create_booking(request).await
        }));
    }

    let mut confirmed = Vec::new();
    let mut rejected = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => confirmed.push(record),
            Err(BookingError::SeatsUnavailable { seat_ids }) => rejected.push(seat_ids),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(confirmed.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0], world.seats);

    // The loser's pending booking was compensated away.
    assert_eq!(world.store.len().await, 1);
    let winner = &confirmed[0];
    assert_eq!(
        world
            .store
            .get(winner.booking.id)
            .await
            .unwrap()
            .unwrap()
            .booking
            .status,
        BookingStatus::Confirmed
    );

    // And the seat is genuinely held by the winner, not half-released.
    let relock = world
        .service
        .lock_seats(world.showtime_id, world.seats.clone(), BookingId::new())
        .await
        .unwrap();
    assert!(!relock.all_locked());
}

#[tokio::test]
async fn expired_promotion_rejects_before_any_side_effect() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();

    let mut request = world.request(world.seat_items());
    request.promotion_code = Some("LASTSUMMER".to_owned());

    let err = orchestrator.create_booking(request).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidPromotion {
            reason: PromotionRejection::OutsideWindow,
            ..
        }
    ));

    assert!(world.store.is_empty().await);
    let lock = world
        .service
        .lock_seats(world.showtime_id, world.seats.clone(), BookingId::new())
        .await
        .unwrap();
    assert!(lock.all_locked());
}

#[tokio::test]
async fn unknown_product_rejects_the_order() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();
    let missing = ProductId::new();

    let err = orchestrator
        .create_booking(world.request(vec![OrderItem::Product {
            product_id: missing,
            quantity: 1,
        }]))
        .await
        .unwrap_err();

    assert_eq!(err, BookingError::ProductNotFound(missing));
    assert!(world.store.is_empty().await);
}

#[tokio::test]
async fn unknown_showtime_rejects_the_order() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();

    let mut request = world.request(world.seat_items());
    let missing = ShowtimeId::new();
    request.showtime_id = missing;

    let err = orchestrator.create_booking(request).await.unwrap_err();
    assert_eq!(err, BookingError::InvalidShowtime(missing));
    assert!(world.store.is_empty().await);
}

#[tokio::test]
async fn duplicate_seat_items_reject_as_invalid_request() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();
    let seat = world.seats[0];

    let err = orchestrator
        .create_booking(world.request(vec![
            OrderItem::Seat { seat_id: seat },
            OrderItem::Seat { seat_id: seat },
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::InvalidRequest { .. }));
    assert!(world.store.is_empty().await);
}

#[tokio::test]
async fn lost_lock_response_releases_seats_and_compensates() {
    let world = world(2).await;
    // The lock reaches the service (seats DO lock) but the response is lost.
    let flaky = Arc::new(
        FlakyInventory::new(Arc::clone(&world.service) as Arc<dyn InventoryApi>)
            .lose_next_lock_responses(1),
    );
    let orchestrator = world.orchestrator_with(
        Arc::clone(&flaky) as Arc<dyn InventoryApi>,
        Arc::clone(&world.store) as Arc<dyn BookingStore>,
        OrchestratorConfig {
            compensation_retry: fast_compensation(),
            ..OrchestratorConfig::default()
        },
    );

    let err = orchestrator
        .create_booking(world.request(world.seat_items()))
        .await
        .unwrap_err();

    // The caller sees the whole requested set as unavailable.
    let mut expected = world.seats.clone();
    expected.sort_unstable();
    assert_eq!(err, BookingError::SeatsUnavailable { seat_ids: expected });

    // The saga issued the best-effort unlock and compensated the booking.
    let unlocks = flaky.unlock_calls();
    assert_eq!(unlocks.len(), 1);
    assert_eq!(unlocks[0].showtime_id, world.showtime_id);
    assert_eq!(unlocks[0].seat_ids, world.seats);
    assert!(world.store.is_empty().await);
    assert!(world.dead_letters.letters().await.is_empty());

    // The unlock landed: the seats are available again.
    let relock = world
        .service
        .lock_seats(world.showtime_id, world.seats.clone(), BookingId::new())
        .await
        .unwrap();
    assert!(relock.all_locked());
}

#[tokio::test]
async fn slow_lock_times_out_and_compensates() {
    let world = world(1).await;
    let flaky = Arc::new(
        FlakyInventory::new(Arc::clone(&world.service) as Arc<dyn InventoryApi>)
            .with_latency(Duration::from_millis(100)),
    );
    let orchestrator = world.orchestrator_with(
        Arc::clone(&flaky) as Arc<dyn InventoryApi>,
        Arc::clone(&world.store) as Arc<dyn BookingStore>,
        OrchestratorConfig {
            lock_timeout: Duration::from_millis(20),
            compensation_retry: fast_compensation(),
            ..OrchestratorConfig::default()
        },
    );

    let err = orchestrator
        .create_booking(world.request(world.seat_items()))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SeatsUnavailable { .. }));

    // Compensated, unlock attempted, and the seat is free: the timed-out
    // lock future was dropped before it reached the ledger.
    assert!(world.store.is_empty().await);
    assert_eq!(flaky.unlock_calls().len(), 1);
    let relock = world
        .service
        .lock_seats(world.showtime_id, world.seats.clone(), BookingId::new())
        .await
        .unwrap();
    assert!(relock.all_locked());
}

#[tokio::test]
async fn exhausted_compensation_is_dead_lettered() {
    let world = world(1).await;
    let memory = Arc::clone(&world.store);
    let failing = Arc::new(FailingStore::new(
        Arc::clone(&memory) as Arc<dyn BookingStore>,
        10,
    ));
    // Refuse the lock outright so compensation runs with nothing locked.
    let flaky = Arc::new(
        FlakyInventory::new(Arc::clone(&world.service) as Arc<dyn InventoryApi>)
            .refuse_next_locks(1),
    );
    let orchestrator = world.orchestrator_with(
        Arc::clone(&flaky) as Arc<dyn InventoryApi>,
        Arc::clone(&failing) as Arc<dyn BookingStore>,
        OrchestratorConfig {
            compensation_retry: fast_compensation(),
            ..OrchestratorConfig::default()
        },
    );

    let err = orchestrator
        .create_booking(world.request(world.seat_items()))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SeatsUnavailable { .. }));

    // One initial attempt plus three retries, then the dead letter.
    assert_eq!(failing.delete_attempts(), 4);
    let letters = world.dead_letters.letters().await;
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].showtime_id, world.showtime_id);
    assert_eq!(letters[0].seat_ids, world.seats);
    assert_eq!(letters[0].attempts, 4);

    // The pending row the compensation could not delete is still there,
    // pointed at by the dead letter for the operator.
    let stranded = memory.get(letters[0].booking_id).await.unwrap().unwrap();
    assert_eq!(stranded.booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn idempotency_key_replays_a_confirmed_booking() {
    let world = world(2).await;
    let orchestrator = world.orchestrator();

    let mut request = world.request(world.seat_items());
    request.idempotency_key = Some(IdempotencyKey::new("checkout-42"));

    let first = orchestrator.create_booking(request.clone()).await.unwrap();
    assert_eq!(first.booking.status, BookingStatus::Confirmed);

    // The retried request returns the original booking, runs no second
    // saga, and leaves the store with one row.
    let replay = orchestrator.create_booking(request).await.unwrap();
    assert_eq!(replay.booking.id, first.booking.id);
    assert_eq!(replay.booking.status, BookingStatus::Confirmed);
    assert_eq!(world.store.len().await, 1);
}

#[tokio::test]
async fn idempotency_key_of_an_in_flight_attempt_is_rejected() {
    let world = world(1).await;
    let orchestrator = world.orchestrator();
    let key = IdempotencyKey::new("checkout-7");

    // Simulate a concurrent attempt that has persisted pending but not yet
    // resolved.
    let pending = BookingRecord {
        booking: Booking {
            id: BookingId::new(),
            user_id: UserId::new(),
            showtime_id: world.showtime_id,
            status: BookingStatus::Pending,
            subtotal: SEAT_PRICE,
            discount: Money::ZERO,
            total: SEAT_PRICE,
            promotion_id: None,
            created_at: world.clock.now(),
        },
        line_items: vec![LineItem::seat(world.seats[0], SEAT_PRICE)],
    };
    let pending_id = pending.booking.id;
    assert_eq!(
        world
            .store
            .create_pending(pending, Some(key.clone()))
            .await
            .unwrap(),
        CreatePending::Created
    );

    let mut request = world.request(world.seat_items());
    request.idempotency_key = Some(key);
    let err = orchestrator.create_booking(request).await.unwrap_err();
    assert_eq!(
        err,
        BookingError::DuplicateRequest {
            booking_id: pending_id
        }
    );
}
