//! Booking DTOs
//!
//! Request and response types for reservation, cancellation and history.

use busline_core::models::{BookingReceipt, BookingStatus, BookingSummary};
use busline_services::CancellationTicket;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Seat reservation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReserveRequest {
    #[validate(range(min = 1, message = "trip_id must be positive"))]
    pub trip_id: i32,

    #[validate(range(min = 1, message = "seat_number must be positive"))]
    pub seat_number: i32,
}

/// Confirmed reservation
#[derive(Debug, Clone, Serialize)]
pub struct ReserveResponse {
    pub booking_id: i64,
    pub trip_id: i32,
    pub seat_number: i32,
    pub price_paid: Decimal,
}

impl From<BookingReceipt> for ReserveResponse {
    fn from(receipt: BookingReceipt) -> Self {
        Self {
            booking_id: receipt.booking_id,
            trip_id: receipt.trip_id,
            seat_number: receipt.seat_number,
            price_paid: receipt.price_paid,
        }
    }
}

/// Accepted cancellation
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub booking_id: i64,
    pub refund_amount: Decimal,
}

impl From<CancellationTicket> for CancelResponse {
    fn from(ticket: CancellationTicket) -> Self {
        Self {
            booking_id: ticket.booking_id,
            refund_amount: ticket.refund_amount,
        }
    }
}

/// One row of the caller's booking history
#[derive(Debug, Clone, Serialize)]
pub struct BookingHistoryItem {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seat_number: i32,
    pub price_paid: Decimal,
    pub status: BookingStatus,
    pub booking_date: NaiveDate,
    pub can_cancel: bool,
}

impl BookingHistoryItem {
    /// Build from a summary, evaluating `can_cancel` as of `now`
    pub fn from_summary(summary: BookingSummary, now: DateTime<Utc>) -> Self {
        let can_cancel = summary.can_cancel(now);
        Self {
            id: summary.id,
            origin: summary.origin,
            destination: summary.destination,
            departure_time: summary.departure_time,
            seat_number: summary.seat_number,
            price_paid: summary.price_paid,
            status: summary.status,
            booking_date: summary.booking_date,
            can_cancel,
        }
    }
}

/// Booking history of the caller
#[derive(Debug, Clone, Serialize)]
pub struct BookingHistoryResponse {
    pub bookings: Vec<BookingHistoryItem>,
    pub total: usize,
}
