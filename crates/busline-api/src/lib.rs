//! API layer for Busline
//!
//! HTTP handlers for reserving and cancelling seats, booking history, trip
//! seats, wallets and the admin operations around them.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod state;

// Re-export DTOs (common types)
pub use dto::ApiResponse;

pub use handlers::{
    configure_admin, configure_bookings, configure_health, configure_trips, configure_wallet,
};
pub use state::{AppState, DatabaseCheck, HealthCheck};
