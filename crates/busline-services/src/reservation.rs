//! Reservation service
//!
//! Orchestrates one reservation:
//! 1. Daily limit check (read-only)
//! 2. Seat lock acquisition, failing fast with `Conflict`
//! 3. The store transaction: seat, wallet, booking
//! 4. Daily counter increment, only after a commit
//! 5. Seat lock release, on every path past step 2

use busline_core::{
    config::BookingConfig,
    models::{BookingReceipt, SeatReservation},
    traits::{BookingStore, CacheService},
    AppResult, Clock,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::daily_limit::DailyLimiter;
use crate::seat_lock::SeatLockManager;

/// Seat reservation coordinator
pub struct ReservationService<S: BookingStore + ?Sized, C: CacheService + 'static> {
    store: Arc<S>,
    locks: SeatLockManager<C>,
    limiter: DailyLimiter<C>,
    clock: Arc<dyn Clock>,
}

impl<S: BookingStore + ?Sized, C: CacheService + 'static> ReservationService<S, C> {
    pub fn new(store: Arc<S>, cache: Arc<C>, clock: Arc<dyn Clock>, config: &BookingConfig) -> Self {
        Self {
            store,
            locks: SeatLockManager::new(Arc::clone(&cache), config.seat_lock_ttl_secs),
            limiter: DailyLimiter::new(
                cache,
                Arc::clone(&clock),
                config.daily_limit,
                config.daily_counter_ttl_secs,
            ),
            clock,
        }
    }

    pub fn limiter(&self) -> &DailyLimiter<C> {
        &self.limiter
    }

    /// Reserve a seat for a user, debiting the trip price from their wallet
    ///
    /// # Errors
    ///
    /// - `LimitExceeded` if the user already made the daily maximum
    /// - `Conflict` if another request holds the seat lock
    /// - `SeatUnavailable`, `InsufficientFunds`, `WalletNotFound` from the store
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        user_id: i32,
        trip_id: i32,
        seat_number: i32,
    ) -> AppResult<BookingReceipt> {
        self.limiter.check(user_id).await?;

        let guard = self.locks.acquire(trip_id, seat_number).await?;

        let request = SeatReservation {
            user_id,
            trip_id,
            seat_number,
            booking_date: self.clock.today(),
        };
        let outcome = self.store.reserve_seat(&request).await;

        match &outcome {
            Ok(receipt) => {
                // Committed: a lost increment under-counts, it never double-charges
                if let Err(e) = self.limiter.increment(user_id).await {
                    warn!("Failed to count reservation for user {}: {}", user_id, e);
                }
                info!(
                    booking_id = receipt.booking_id,
                    price_paid = %receipt.price_paid,
                    "Reservation confirmed"
                );
            }
            Err(e) if e.is_invariant_violation() => {
                error!(error = %e, "Reservation hit an internal invariant violation");
            }
            Err(_) => {}
        }

        if let Err(e) = guard.release().await {
            warn!("Failed to release seat lock, it will expire: {}", e);
        }

        outcome
    }
}
