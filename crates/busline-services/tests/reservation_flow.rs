//! End-to-end tests of the reservation engine against the in-memory stores
//!
//! The stores keep the same atomicity guarantees as Redis and PostgreSQL, so
//! these tests exercise the real lock, throttle and transaction ordering.

use busline_cache::keys::{daily_limit_key, seat_lock_key};
use busline_cache::MemoryCache;
use busline_core::{
    config::BookingConfig,
    models::{BookingStatus, NewTrip, Trip},
    traits::{CacheService, TripRepository, WalletRepository},
    AppError, Clock, FixedClock,
};
use busline_db::MemoryBookingStore;
use busline_services::{refund_pipeline, CancellationService, ReservationService};
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryBookingStore>,
    cache: Arc<MemoryCache>,
    clock: Arc<dyn Clock>,
    reservations: Arc<ReservationService<MemoryBookingStore, MemoryCache>>,
    trip: Trip,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap()
}

async fn harness(capacity: i32, price: Decimal) -> Harness {
    let store = Arc::new(MemoryBookingStore::new());
    let cache = Arc::new(MemoryCache::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now()));

    let route_id = store.add_route("Tehran", "Mashhad");
    let bus_id = store.add_bus(capacity);
    let trip = store
        .create_trip(&NewTrip {
            route_id,
            bus_id,
            departure_time: now() + Duration::days(1),
            arrival_time: now() + Duration::days(1) + Duration::hours(12),
            price,
        })
        .await
        .unwrap();

    let reservations = Arc::new(ReservationService::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        &BookingConfig::default(),
    ));

    Harness {
        store,
        cache,
        clock,
        reservations,
        trip,
    }
}

async fn assert_no_locks(h: &Harness) {
    for seat in 1..=h.trip.capacity {
        assert!(
            !h.cache
                .exists(&seat_lock_key(h.trip.id, seat))
                .await
                .unwrap(),
            "seat {} still locked",
            seat
        );
    }
}

#[tokio::test]
async fn test_successful_reservation() {
    let h = harness(10, dec!(600000)).await;
    h.store.open_wallet(1, dec!(1000000));

    let receipt = h.reservations.reserve(1, h.trip.id, 4).await.unwrap();

    assert_eq!(receipt.price_paid, dec!(600000));
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(400000)));
    assert!(h.store.seat(h.trip.id, 4).unwrap().is_reserved);

    let booking = h.store.booking(receipt.booking_id).unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.booking_date, h.clock.today());

    assert_eq!(h.reservations.limiter().count(1).await.unwrap(), 1);
    assert_no_locks(&h).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_of_one_seat_have_one_winner() {
    let h = harness(10, dec!(100)).await;
    for user in 1..=16 {
        h.store.open_wallet(user, dec!(1000));
    }

    let attempts = (1..=16).map(|user| {
        let reservations = h.reservations.clone();
        let trip_id = h.trip.id;
        tokio::spawn(async move { reservations.reserve(user, trip_id, 7).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        match result {
            AppError::Conflict(_) => {}
            AppError::SeatUnavailable {
                available_seats, ..
            } => assert!(!available_seats.contains(&7)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(h.store.booking_count(), 1);
    let total: Decimal = {
        let mut sum = Decimal::ZERO;
        for user in 1..=16 {
            sum += h.store.balance(user).await.unwrap().unwrap();
        }
        sum
    };
    assert_eq!(total, dec!(16000) - dec!(100));
    assert_no_locks(&h).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_never_overdraw_a_wallet() {
    let h = harness(10, dec!(600000)).await;
    h.store.open_wallet(1, dec!(1000000));

    let attempts = (1..=5).map(|seat| {
        let reservations = h.reservations.clone();
        let trip_id = h.trip.id;
        tokio::spawn(async move { reservations.reserve(1, trip_id, seat).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        AppError::InsufficientFunds {
            required,
            current_balance,
        } if *required == dec!(600000) && *current_balance == dec!(400000)
    )));
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(400000)));
}

#[tokio::test]
async fn test_taken_seat_reports_remaining_seats() {
    let h = harness(4, dec!(600000)).await;
    h.store.open_wallet(1, dec!(1000000));
    h.store.open_wallet(2, dec!(1000000));

    let first = h.reservations.reserve(1, h.trip.id, 2).await.unwrap();
    let err = h.reservations.reserve(2, h.trip.id, 2).await.unwrap_err();

    assert_eq!(
        err,
        AppError::SeatUnavailable {
            trip_id: h.trip.id,
            seat_number: 2,
            available_seats: vec![1, 3, 4],
        }
    );
    assert_eq!(h.store.booking_count(), 1);
    assert!(h.store.booking(first.booking_id).is_some());
    assert_eq!(h.store.balance(2).await.unwrap(), Some(dec!(1000000)));
    assert_eq!(h.reservations.limiter().count(2).await.unwrap(), 0);
    assert_no_locks(&h).await;
}

#[tokio::test]
async fn test_contended_lock_fails_fast_without_touching_the_store() {
    let h = harness(4, dec!(100)).await;
    h.store.open_wallet(1, dec!(1000));

    let key = seat_lock_key(h.trip.id, 1);
    assert!(h.cache.set_nx_ex(&key, "other-request", 10).await.unwrap());

    let err = h.reservations.reserve(1, h.trip.id, 1).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.status_code().as_u16(), 409);
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(1000)));
    // The other holder's lock is left alone
    assert!(h.cache.delete_if_equals(&key, "other-request").await.unwrap());
}

#[tokio::test]
async fn test_insufficient_funds_leaves_counter_and_lock_clean() {
    let h = harness(4, dec!(600000)).await;
    h.store.open_wallet(1, dec!(500000));

    let err = h.reservations.reserve(1, h.trip.id, 1).await.unwrap_err();

    assert_eq!(
        err,
        AppError::InsufficientFunds {
            required: dec!(600000),
            current_balance: dec!(500000),
        }
    );
    assert_eq!(h.reservations.limiter().count(1).await.unwrap(), 0);
    assert!(!h
        .cache
        .exists(&daily_limit_key(1, h.clock.today()))
        .await
        .unwrap());
    assert!(!h.store.seat(h.trip.id, 1).unwrap().is_reserved);
    assert_no_locks(&h).await;
}

#[tokio::test]
async fn test_missing_wallet_is_an_invariant_violation() {
    let h = harness(4, dec!(100)).await;

    let err = h.reservations.reserve(99, h.trip.id, 1).await.unwrap_err();

    assert!(err.is_invariant_violation());
    assert_eq!(err.status_code().as_u16(), 500);
    assert!(!h.store.seat(h.trip.id, 1).unwrap().is_reserved);
    assert_no_locks(&h).await;
}

#[tokio::test]
async fn test_twentieth_reservation_succeeds_twenty_first_is_throttled() {
    let h = harness(25, dec!(10)).await;
    h.store.open_wallet(1, dec!(1000));

    for seat in 1..=20 {
        h.reservations
            .reserve(1, h.trip.id, seat)
            .await
            .unwrap_or_else(|e| panic!("reservation {seat} failed: {e}"));
    }

    let err = h.reservations.reserve(1, h.trip.id, 21).await.unwrap_err();
    assert_eq!(err, AppError::LimitExceeded { limit: 20 });
    assert_eq!(err.status_code().as_u16(), 429);

    assert_eq!(h.reservations.limiter().count(1).await.unwrap(), 20);
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(800)));
    assert!(!h.store.seat(h.trip.id, 21).unwrap().is_reserved);
}

#[tokio::test]
async fn test_cancel_restores_balance_once() {
    let h = harness(4, dec!(600000)).await;
    h.store.open_wallet(1, dec!(1000000));
    let receipt = h.reservations.reserve(1, h.trip.id, 3).await.unwrap();

    let (queue, worker) = refund_pipeline(h.store.clone(), &BookingConfig::default());
    let worker = worker.spawn();
    let cancellations = CancellationService::new(h.store.clone(), queue, h.clock.clone());

    let ticket = cancellations.cancel(receipt.booking_id, 1).await.unwrap();
    assert_eq!(ticket.refund_amount, dec!(600000));

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let cancelled = h
                .store
                .booking(receipt.booking_id)
                .is_some_and(|b| b.status == BookingStatus::Cancelled);
            if cancelled {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("refund was not applied");

    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(1000000)));
    assert!(!h.store.seat(h.trip.id, 3).unwrap().is_reserved);

    let err = cancellations.cancel(receipt.booking_id, 1).await.unwrap_err();
    assert_eq!(err, AppError::AlreadyCancelled(receipt.booking_id));

    drop(cancellations);
    worker.await.unwrap();
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(1000000)));
}

#[tokio::test]
async fn test_cancel_after_departure_is_rejected() {
    let h = harness(4, dec!(600000)).await;
    h.store.open_wallet(1, dec!(1000000));
    let receipt = h.reservations.reserve(1, h.trip.id, 1).await.unwrap();

    let (queue, mut receiver) = busline_services::RefundQueue::channel(4);
    let after_departure: Arc<dyn Clock> =
        Arc::new(FixedClock::new(h.trip.departure_time + Duration::minutes(1)));
    let cancellations = CancellationService::new(h.store.clone(), queue, after_departure);

    let err = cancellations.cancel(receipt.booking_id, 1).await.unwrap_err();

    assert_eq!(err, AppError::DepartureAlreadyPassed(receipt.booking_id));
    assert!(receiver.try_recv().is_err());
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(400000)));
    assert_eq!(
        h.store.booking(receipt.booking_id).unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn test_cancel_at_departure_instant_is_rejected() {
    let h = harness(4, dec!(100)).await;
    h.store.open_wallet(1, dec!(1000));
    let receipt = h.reservations.reserve(1, h.trip.id, 1).await.unwrap();

    let (queue, _receiver) = busline_services::RefundQueue::channel(4);
    let at_departure: Arc<dyn Clock> = Arc::new(FixedClock::new(h.trip.departure_time));
    let cancellations = CancellationService::new(h.store.clone(), queue, at_departure);

    assert_eq!(
        cancellations.cancel(receipt.booking_id, 1).await,
        Err(AppError::DepartureAlreadyPassed(receipt.booking_id))
    );
}

#[tokio::test]
async fn test_cancel_of_someone_elses_booking_is_not_found() {
    let h = harness(4, dec!(100)).await;
    h.store.open_wallet(1, dec!(1000));
    let receipt = h.reservations.reserve(1, h.trip.id, 1).await.unwrap();

    let (queue, mut receiver) = busline_services::RefundQueue::channel(4);
    let cancellations = CancellationService::new(h.store.clone(), queue, h.clock.clone());

    let err = cancellations.cancel(receipt.booking_id, 2).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = cancellations.cancel(12345, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_cancelled_seat_can_be_booked_again() {
    let h = harness(2, dec!(100)).await;
    h.store.open_wallet(1, dec!(100));
    h.store.open_wallet(2, dec!(100));

    let receipt = h.reservations.reserve(1, h.trip.id, 1).await.unwrap();

    let (queue, worker) = refund_pipeline(h.store.clone(), &BookingConfig::default());
    let worker = worker.spawn();
    let cancellations = CancellationService::new(h.store.clone(), queue, h.clock.clone());
    cancellations.cancel(receipt.booking_id, 1).await.unwrap();
    drop(cancellations);
    worker.await.unwrap();

    let second = h.reservations.reserve(2, h.trip.id, 1).await.unwrap();
    assert_ne!(second.booking_id, receipt.booking_id);
    assert_eq!(h.store.balance(1).await.unwrap(), Some(dec!(100)));
    assert_eq!(h.store.balance(2).await.unwrap(), Some(dec!(0)));
}
