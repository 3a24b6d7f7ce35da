//! Booking store implementation
//!
//! Runs the reservation and refund transactions against PostgreSQL. Seat,
//! wallet and booking rows are locked with `SELECT ... FOR UPDATE` so that
//! concurrent transactions touching the same rows queue behind each other.

use busline_core::{
    models::{
        BookingReceipt, BookingStatus, BookingSummary, CancellationCandidate, RefundOutcome,
        SeatReservation,
    },
    traits::BookingStore,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

/// PostgreSQL implementation of BookingStore
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    /// Create a new booking store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse booking status from string
    fn parse_status(s: &str) -> BookingStatus {
        BookingStatus::from_str(s).unwrap_or_default()
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    #[instrument(skip(self, request), fields(user_id = request.user_id, trip_id = request.trip_id, seat_number = request.seat_number))]
    async fn reserve_seat(&self, request: &SeatReservation) -> AppResult<BookingReceipt> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Lock the seat row; the trip price is read in the same statement
        let seat = sqlx::query_as::<sqlx::Postgres, SeatPriceRow>(
            r#"
            SELECT s.id, s.is_reserved, t.price
            FROM seats s
            JOIN trips t ON t.id = s.trip_id
            WHERE s.trip_id = $1 AND s.seat_number = $2
            FOR UPDATE OF s
            "#,
        )
        .bind(request.trip_id)
        .bind(request.seat_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock seat: {}", e);
            AppError::Database(format!("Failed to lock seat: {}", e))
        })?;

        let seat = match seat {
            Some(seat) if !seat.is_reserved => seat,
            _ => {
                tx.rollback().await.map_err(|e| {
                    AppError::Transaction(format!("Failed to roll back transaction: {}", e))
                })?;
                let available_seats = self.available_seats(request.trip_id).await?;
                debug!("Seat unavailable, {} seats still free", available_seats.len());
                return Err(AppError::SeatUnavailable {
                    trip_id: request.trip_id,
                    seat_number: request.seat_number,
                    available_seats,
                });
            }
        };

        // Lock the wallet row
        let balance: Option<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT balance
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock wallet: {}", e);
            AppError::Database(format!("Failed to lock wallet: {}", e))
        })?;

        let (balance,) = balance.ok_or_else(|| {
            error!(user_id = request.user_id, "User has no wallet");
            AppError::WalletNotFound(request.user_id)
        })?;

        if balance < seat.price {
            warn!(
                "Insufficient balance for user {}: required {}, available {}",
                request.user_id, seat.price, balance
            );
            return Err(AppError::InsufficientFunds {
                required: seat.price,
                current_balance: balance,
            });
        }

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance - $2
            WHERE user_id = $1
            "#,
        )
        .bind(request.user_id)
        .bind(seat.price)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to debit wallet: {}", e);
            AppError::Database(format!("Failed to debit wallet: {}", e))
        })?;

        sqlx::query("UPDATE seats SET is_reserved = true WHERE id = $1")
            .bind(seat.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to mark seat reserved: {}", e);
                AppError::Database(format!("Failed to mark seat reserved: {}", e))
            })?;

        let (booking_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO bookings (user_id, trip_id, seat_id, price_paid, status, booking_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(request.user_id)
        .bind(request.trip_id)
        .bind(seat.id)
        .bind(seat.price)
        .bind(BookingStatus::Confirmed.to_string())
        .bind(request.booking_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create booking: {}", e);
            AppError::Database(format!("Failed to create booking: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(booking_id, price_paid = %seat.price, "Seat reserved");

        Ok(BookingReceipt {
            booking_id,
            trip_id: request.trip_id,
            seat_number: request.seat_number,
            price_paid: seat.price,
        })
    }

    #[instrument(skip(self))]
    async fn find_for_cancellation(
        &self,
        booking_id: i64,
        user_id: i32,
    ) -> AppResult<Option<CancellationCandidate>> {
        let row = sqlx::query_as::<sqlx::Postgres, CancellationRow>(
            r#"
            SELECT b.id, b.user_id, b.price_paid, b.status, t.departure_time
            FROM bookings b
            JOIN seats s ON b.seat_id = s.id
            JOIN trips t ON s.trip_id = t.id
            WHERE b.id = $1 AND b.user_id = $2
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding booking {}: {}", booking_id, e);
            AppError::Database(format!("Failed to find booking: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn refund_booking(&self, booking_id: i64) -> AppResult<RefundOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // The booking row lock serializes concurrent deliveries of one refund
        let booking = sqlx::query_as::<sqlx::Postgres, RefundRow>(
            r#"
            SELECT user_id, seat_id, price_paid, status
            FROM bookings
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock booking: {}", e);
            AppError::Database(format!("Failed to lock booking: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if Self::parse_status(&booking.status).is_cancelled() {
            debug!("Booking {} already refunded", booking_id);
            tx.rollback().await.map_err(|e| {
                AppError::Transaction(format!("Failed to roll back transaction: {}", e))
            })?;
            return Ok(RefundOutcome::AlreadyCancelled);
        }

        let credited = sqlx::query("UPDATE wallets SET balance = balance + $2 WHERE user_id = $1")
            .bind(booking.user_id)
            .bind(booking.price_paid)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to credit wallet: {}", e);
                AppError::Database(format!("Failed to credit wallet: {}", e))
            })?;

        if credited.rows_affected() == 0 {
            error!(user_id = booking.user_id, "Refund target has no wallet");
            return Err(AppError::InternalInvariantViolation(format!(
                "Wallet for user {} missing while refunding booking {}",
                booking.user_id, booking_id
            )));
        }

        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(BookingStatus::Cancelled.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to mark booking cancelled: {}", e);
                AppError::Database(format!("Failed to mark booking cancelled: {}", e))
            })?;

        sqlx::query("UPDATE seats SET is_reserved = false WHERE id = $1")
            .bind(booking.seat_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to release seat: {}", e);
                AppError::Database(format!("Failed to release seat: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Refunded booking {}: {} to user {}",
            booking_id, booking.price_paid, booking.user_id
        );

        Ok(RefundOutcome::Refunded {
            user_id: booking.user_id,
            amount: booking.price_paid,
        })
    }

    #[instrument(skip(self))]
    async fn available_seats(&self, trip_id: i32) -> AppResult<Vec<i32>> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT seat_number
            FROM seats
            WHERE trip_id = $1 AND is_reserved = false
            ORDER BY seat_number
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing free seats: {}", e);
            AppError::Database(format!("Failed to list available seats: {}", e))
        })?;

        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookingSummary>> {
        let rows = sqlx::query_as::<sqlx::Postgres, SummaryRow>(
            r#"
            SELECT
                b.id, r.origin, r.destination, t.departure_time,
                s.seat_number, b.price_paid, b.status, b.booking_date
            FROM bookings b
            JOIN seats s ON b.seat_id = s.id
            JOIN trips t ON s.trip_id = t.id
            JOIN routes r ON t.route_id = r.id
            WHERE b.user_id = $1
            ORDER BY b.booking_date DESC, b.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing bookings: {}", e);
            AppError::Database(format!("Failed to list bookings: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SeatPriceRow {
    id: i32,
    is_reserved: bool,
    price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    user_id: i32,
    seat_id: i32,
    price_paid: Decimal,
    status: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CancellationRow {
    id: i64,
    user_id: i32,
    price_paid: Decimal,
    status: String,
    departure_time: DateTime<Utc>,
}

impl From<CancellationRow> for CancellationCandidate {
    fn from(row: CancellationRow) -> Self {
        Self {
            booking_id: row.id,
            user_id: row.user_id,
            price_paid: row.price_paid,
            status: PgBookingStore::parse_status(&row.status),
            departure_time: row.departure_time,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    seat_number: i32,
    price_paid: Decimal,
    status: String,
    booking_date: NaiveDate,
}

impl From<SummaryRow> for BookingSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            seat_number: row.seat_number,
            price_paid: row.price_paid,
            status: PgBookingStore::parse_status(&row.status),
            booking_date: row.booking_date,
        }
    }
}
