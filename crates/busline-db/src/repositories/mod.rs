//! Repository implementations
//!
//! Concrete implementations of the store traits defined in busline-core,
//! using sqlx for PostgreSQL access.

pub mod booking_repo;
pub mod trip_repo;
pub mod wallet_repo;

pub use booking_repo::PgBookingStore;
pub use trip_repo::PgTripRepository;
pub use wallet_repo::PgWalletRepository;
