//! Booking models
//!
//! A booking is the durable record of a seat purchase. It is created
//! `Confirmed` by a successful reservation and moves to `Cancelled` at most
//! once, when its refund is applied.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AppError, AppResult};

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Seat is held and paid for
    #[default]
    Confirmed,
    /// Refunded; the seat has been released
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }
}

/// Booking entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i32,
    pub trip_id: i32,
    pub seat_id: i32,
    /// Trip price at reservation time; never updated afterwards
    pub price_paid: Decimal,
    pub status: BookingStatus,
    pub booking_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input of the reservation transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SeatReservation {
    pub user_id: i32,
    pub trip_id: i32,
    pub seat_number: i32,
    pub booking_date: NaiveDate,
}

/// Committed reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking_id: i64,
    pub trip_id: i32,
    pub seat_number: i32,
    pub price_paid: Decimal,
}

/// Booking facts needed to decide whether it may be cancelled
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationCandidate {
    pub booking_id: i64,
    pub user_id: i32,
    pub price_paid: Decimal,
    pub status: BookingStatus,
    pub departure_time: DateTime<Utc>,
}

impl CancellationCandidate {
    /// Apply the cancellation rules as of `now`
    ///
    /// # Errors
    ///
    /// - `AlreadyCancelled` if the booking was cancelled before
    /// - `DepartureAlreadyPassed` unless `now` is strictly before departure
    pub fn check_eligible(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status.is_cancelled() {
            return Err(AppError::AlreadyCancelled(self.booking_id));
        }

        if self.departure_time <= now {
            return Err(AppError::DepartureAlreadyPassed(self.booking_id));
        }

        Ok(())
    }
}

/// Result of applying a refund job
#[derive(Debug, Clone, PartialEq)]
pub enum RefundOutcome {
    /// Wallet credited, booking cancelled, seat released
    Refunded { user_id: i32, amount: Decimal },
    /// A previous delivery already applied this refund; nothing changed
    AlreadyCancelled,
}

/// Row of a user's booking history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seat_number: i32,
    pub price_paid: Decimal,
    pub status: BookingStatus,
    pub booking_date: NaiveDate,
}

impl BookingSummary {
    pub fn can_cancel(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_cancelled() && self.departure_time > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn candidate(status: BookingStatus, departure_time: DateTime<Utc>) -> CancellationCandidate {
        CancellationCandidate {
            booking_id: 9,
            user_id: 1,
            price_paid: dec!(600000),
            status,
            departure_time,
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            BookingStatus::from_str("Confirmed"),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(
            BookingStatus::from_str("cancelled"),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(BookingStatus::from_str("pending"), None);
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_eligible_before_departure() {
        let now = Utc::now();
        let c = candidate(BookingStatus::Confirmed, now + Duration::hours(2));
        assert!(c.check_eligible(now).is_ok());
    }

    #[test]
    fn test_cancelled_booking_is_rejected_first() {
        let now = Utc::now();
        let c = candidate(BookingStatus::Cancelled, now - Duration::hours(2));
        assert_eq!(c.check_eligible(now), Err(AppError::AlreadyCancelled(9)));
    }

    #[test]
    fn test_departure_boundary() {
        let now = Utc::now();
        let c = candidate(BookingStatus::Confirmed, now);
        assert_eq!(
            c.check_eligible(now),
            Err(AppError::DepartureAlreadyPassed(9))
        );
    }

    #[test]
    fn test_summary_can_cancel() {
        let now = Utc::now();
        let mut summary = BookingSummary {
            id: 1,
            origin: "Tehran".to_string(),
            destination: "Shiraz".to_string(),
            departure_time: now + Duration::hours(1),
            seat_number: 4,
            price_paid: dec!(600000),
            status: BookingStatus::Confirmed,
            booking_date: now.date_naive(),
        };
        assert!(summary.can_cancel(now));

        summary.status = BookingStatus::Cancelled;
        assert!(!summary.can_cancel(now));
    }
}
