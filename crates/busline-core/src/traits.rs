//! Common traits for stores and services
//!
//! The reservation engine talks to two collaborators: a relational store
//! with row-level locking (`BookingStore`, `TripRepository`,
//! `WalletRepository`) and a shared key-value store (`CacheService`).
//! Implementations are constructed once at start-up and shared behind `Arc`.

use crate::error::AppError;
use crate::models::{
    BookingReceipt, BookingSummary, Bus, CancellationCandidate, NewBus, NewTrip, RefundOutcome,
    Seat, SeatReservation, Trip, TripPage, TripSearch,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Transactional booking operations
///
/// Every method runs as one atomic unit against the relational store: a
/// returned error means nothing was written.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Reserve a seat: lock the seat row and the wallet row, debit the trip
    /// price, mark the seat reserved and insert a confirmed booking.
    ///
    /// # Errors
    ///
    /// - `SeatUnavailable` (with the trip's free seats) if the seat is missing or taken
    /// - `WalletNotFound` if the user has no wallet
    /// - `InsufficientFunds` if the balance is below the trip price
    async fn reserve_seat(&self, request: &SeatReservation) -> Result<BookingReceipt, AppError>;

    /// Load the booking, scoped to its owner, for the cancellation rules
    async fn find_for_cancellation(
        &self,
        booking_id: i64,
        user_id: i32,
    ) -> Result<Option<CancellationCandidate>, AppError>;

    /// Credit the wallet by the price paid, mark the booking cancelled and
    /// release its seat. Does nothing if the booking is already cancelled.
    /// A booking whose owner has no wallet is an `InternalInvariantViolation`.
    async fn refund_booking(&self, booking_id: i64) -> Result<RefundOutcome, AppError>;

    /// Seat numbers still free on a trip, ascending
    async fn available_seats(&self, trip_id: i32) -> Result<Vec<i32>, AppError>;

    /// Booking history of a user, newest first
    async fn list_for_user(&self, user_id: i32) -> Result<Vec<BookingSummary>, AppError>;
}

/// Trip repository
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Insert a trip and its seats 1..=capacity of the bus, atomically
    async fn create_trip(&self, trip: &NewTrip) -> Result<Trip, AppError>;

    /// Find trip by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Trip>, AppError>;

    /// All seats of a trip ordered by seat number
    async fn seats(&self, trip_id: i32) -> Result<Vec<Seat>, AppError>;

    /// Register a bus; `AlreadyExists` if the plate is taken
    async fn create_bus(&self, bus: &NewBus) -> Result<Bus, AppError>;

    /// All buses ordered by id
    async fn list_buses(&self) -> Result<Vec<Bus>, AppError>;

    /// Filtered, price-ordered page of trips with their free seat counts
    async fn search_trips(&self, search: &TripSearch) -> Result<TripPage, AppError>;
}

/// Wallet repository
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Current balance, `None` if the user has no wallet
    async fn balance(&self, user_id: i32) -> Result<Option<Decimal>, AppError>;

    /// Add a positive amount and return the new balance
    async fn top_up(&self, user_id: i32, amount: Decimal) -> Result<Decimal, AppError>;
}

/// Shared key-value store
///
/// The lock and counter primitives are single atomic operations on the
/// server; callers never read-modify-write.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Read a JSON value, `None` if absent or expired
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Whether a live value is stored under `key`
    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Store `value` under `key` with a TTL only if the key is absent.
    /// Returns `true` if this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, AppError>;

    /// Delete `key` only if it currently holds `expected`.
    /// Returns `true` if the key was deleted.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError>;

    /// Increment a counter, creating it at 1 with `ttl_secs` if absent.
    /// The TTL is set only on creation. Returns the new value.
    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, AppError>;
}
