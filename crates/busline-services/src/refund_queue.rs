//! Deferred refund pipeline
//!
//! Cancellations hand refunds to a bounded in-process queue and return at
//! once. A single worker task drains the queue, retrying transient store
//! failures with exponential backoff. Applying a refund twice is harmless
//! because the store checks the booking status under a row lock first.

use busline_core::{
    config::BookingConfig, models::RefundOutcome, traits::BookingStore, AppError, AppResult,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Refund request for one booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundJob {
    pub booking_id: i64,
}

/// Producer handle of the refund queue
#[derive(Clone)]
pub struct RefundQueue {
    sender: mpsc::Sender<RefundJob>,
}

impl RefundQueue {
    /// Create a queue holding up to `capacity` pending jobs
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RefundJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue a job, waiting for room if the queue is full
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the worker has shut down
    pub async fn enqueue(&self, job: RefundJob) -> AppResult<()> {
        self.sender.send(job).await.map_err(|_| {
            error!(booking_id = job.booking_id, "Refund queue is closed");
            AppError::Internal("Refund queue is closed".to_string())
        })?;
        debug!(booking_id = job.booking_id, "Refund enqueued");
        Ok(())
    }
}

/// Consumer of the refund queue
pub struct RefundWorker<S: BookingStore + ?Sized> {
    store: Arc<S>,
    receiver: mpsc::Receiver<RefundJob>,
    max_attempts: u32,
    retry_base: Duration,
}

impl<S: BookingStore + ?Sized + 'static> RefundWorker<S> {
    pub fn new(
        store: Arc<S>,
        receiver: mpsc::Receiver<RefundJob>,
        max_attempts: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            store,
            receiver,
            max_attempts: max_attempts.max(1),
            retry_base,
        }
    }

    /// Process jobs until every `RefundQueue` handle has been dropped
    pub async fn run(mut self) {
        info!("Refund worker started");
        while let Some(job) = self.receiver.recv().await {
            // Failures are logged inside; the worker keeps going
            let _ = self.process(job).await;
        }
        info!("Refund worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Apply one refund, retrying transient errors
    #[instrument(skip(self), fields(booking_id = job.booking_id))]
    pub async fn process(&self, job: RefundJob) -> AppResult<RefundOutcome> {
        let mut attempt = 1;

        loop {
            match self.store.refund_booking(job.booking_id).await {
                Ok(outcome) => {
                    match &outcome {
                        RefundOutcome::Refunded { user_id, amount } => {
                            info!("Refunded {} to user {}", amount, user_id)
                        }
                        RefundOutcome::AlreadyCancelled => {
                            debug!("Booking already refunded, nothing to do")
                        }
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        attempt,
                        error = %e,
                        "Refund failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "Refund abandoned");
                    return Err(e);
                }
            }
        }
    }
}

/// Build the queue and its worker from configuration
pub fn refund_pipeline<S: BookingStore + ?Sized + 'static>(
    store: Arc<S>,
    config: &BookingConfig,
) -> (RefundQueue, RefundWorker<S>) {
    let (queue, receiver) = RefundQueue::channel(config.refund_queue_capacity);
    let worker = RefundWorker::new(
        store,
        receiver,
        config.refund_max_attempts,
        Duration::from_millis(config.refund_retry_base_ms),
    );
    (queue, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use busline_core::models::{NewTrip, SeatReservation};
    use busline_core::traits::{TripRepository, WalletRepository};
    use busline_db::MemoryBookingStore;
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    async fn booked_store() -> (Arc<MemoryBookingStore>, i64) {
        let store = Arc::new(MemoryBookingStore::new());
        let route_id = store.add_route("Tehran", "Isfahan");
        let bus_id = store.add_bus(4);
        let departure = Utc::now() + ChronoDuration::days(2);
        let trip = store
            .create_trip(&NewTrip {
                route_id,
                bus_id,
                departure_time: departure,
                arrival_time: departure + ChronoDuration::hours(6),
                price: dec!(600000),
            })
            .await
            .unwrap();

        store.open_wallet(1, dec!(1000000));
        let receipt = store
            .reserve_seat(&SeatReservation {
                user_id: 1,
                trip_id: trip.id,
                seat_number: 1,
                booking_date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            })
            .await
            .unwrap();

        (store, receipt.booking_id)
    }

    fn worker(store: &Arc<MemoryBookingStore>, max_attempts: u32) -> RefundWorker<MemoryBookingStore> {
        let (_queue, receiver) = RefundQueue::channel(8);
        RefundWorker::new(store.clone(), receiver, max_attempts, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let (store, booking_id) = booked_store().await;
        store.fail_next_refunds(2);

        let outcome = worker(&store, 5)
            .process(RefundJob { booking_id })
            .await
            .unwrap();

        assert!(matches!(outcome, RefundOutcome::Refunded { .. }));
        assert_eq!(store.balance(1).await.unwrap(), Some(dec!(1000000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let (store, booking_id) = booked_store().await;
        store.fail_next_refunds(10);

        let err = worker(&store, 3)
            .process(RefundJob { booking_id })
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.balance(1).await.unwrap(), Some(dec!(400000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let (store, booking_id) = booked_store().await;
        store.fail_next_refunds(3);

        let started = tokio::time::Instant::now();
        worker(&store, 5)
            .process(RefundJob { booking_id })
            .await
            .unwrap();

        // 100ms + 200ms + 400ms
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_redelivery_does_not_double_refund() {
        let (store, booking_id) = booked_store().await;
        let (queue, receiver) = RefundQueue::channel(8);
        let handle = RefundWorker::new(store.clone(), receiver, 3, Duration::from_millis(1)).spawn();

        queue.enqueue(RefundJob { booking_id }).await.unwrap();
        queue.enqueue(RefundJob { booking_id }).await.unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(store.balance(1).await.unwrap(), Some(dec!(1000000)));
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let (queue, receiver) = RefundQueue::channel(1);
        drop(receiver);

        let result = queue.enqueue(RefundJob { booking_id: 1 }).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
