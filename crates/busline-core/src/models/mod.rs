//! Domain models for Busline
//!
//! This module contains all the core domain models used throughout the application.

pub mod booking;
pub mod trip;
pub mod user;
pub mod wallet;

pub use booking::{
    Booking, BookingReceipt, BookingStatus, BookingSummary, CancellationCandidate, RefundOutcome,
    SeatReservation,
};
pub use trip::{AvailableTrip, Bus, NewBus, NewTrip, Seat, Trip, TripPage, TripSearch, TripSort};
pub use user::UserRole;
pub use wallet::Wallet;
