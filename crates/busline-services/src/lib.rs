//! Business logic services for Busline
//!
//! This crate contains the seat reservation concurrency engine: the pieces
//! that keep a seat from being sold twice and a wallet from being overdrawn
//! while many requests race for the same seats.
//!
//! # Architecture
//!
//! Services are generic over the store traits of busline-core:
//! - The relational store (`BookingStore`) runs each reservation and refund
//!   as one transaction with row locks
//! - The shared key-value store (`CacheService`) holds seat locks and daily
//!   counters, mutated only through atomic primitives
//! - Shared handles are constructed at start-up and passed in as `Arc`s
//!
//! # Services
//!
//! - `SeatLockManager` - Exclusive, TTL-bounded claims on a (trip, seat) pair
//! - `DailyLimiter` - Per-user cap on successful reservations per day
//! - `ReservationService` - Throttle check, lock, transaction, count, release
//! - `CancellationService` - Eligibility check and refund hand-off
//! - `RefundQueue` / `RefundWorker` - Deferred, retried, idempotent refunds

pub mod cancellation;
pub mod daily_limit;
pub mod refund_queue;
pub mod reservation;
pub mod seat_lock;

pub use cancellation::{CancellationService, CancellationTicket};
pub use daily_limit::DailyLimiter;
pub use refund_queue::{refund_pipeline, RefundJob, RefundQueue, RefundWorker};
pub use reservation::ReservationService;
pub use seat_lock::{SeatLockGuard, SeatLockManager};
