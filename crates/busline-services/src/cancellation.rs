//! Cancellation service
//!
//! Checks synchronously that a booking may be cancelled, then defers the
//! refund to the refund queue. An ineligible request touches nothing.

use busline_core::{traits::BookingStore, AppError, AppResult, Clock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::refund_queue::{RefundJob, RefundQueue};

/// Accepted cancellation; the refund is in progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationTicket {
    pub booking_id: i64,
    pub refund_amount: Decimal,
}

pub struct CancellationService<S: BookingStore + ?Sized> {
    store: Arc<S>,
    refunds: RefundQueue,
    clock: Arc<dyn Clock>,
}

impl<S: BookingStore + ?Sized> CancellationService<S> {
    pub fn new(store: Arc<S>, refunds: RefundQueue, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            refunds,
            clock,
        }
    }

    /// Cancel a booking on behalf of its owner
    ///
    /// # Errors
    ///
    /// - `NotFound` if the booking does not exist or belongs to someone else
    /// - `AlreadyCancelled` if it was cancelled before
    /// - `DepartureAlreadyPassed` if the trip has left
    #[instrument(skip(self))]
    pub async fn cancel(&self, booking_id: i64, user_id: i32) -> AppResult<CancellationTicket> {
        let candidate = self
            .store
            .find_for_cancellation(booking_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        candidate.check_eligible(self.clock.now())?;

        self.refunds.enqueue(RefundJob { booking_id }).await?;

        info!(
            "Cancellation of booking {} accepted, refund of {} in progress",
            booking_id, candidate.price_paid
        );

        Ok(CancellationTicket {
            booking_id,
            refund_amount: candidate.price_paid,
        })
    }
}
