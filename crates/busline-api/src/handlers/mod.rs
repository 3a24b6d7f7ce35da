//! HTTP request handlers
//!
//! Handlers are generic over the cache backend; each module's `configure`
//! must be instantiated with the same `C` as the registered `AppState<C>`.

pub mod admin;
pub mod booking;
pub mod health;
pub mod trip;
pub mod wallet;

pub use admin::configure as configure_admin;
pub use booking::configure as configure_bookings;
pub use health::configure as configure_health;
pub use trip::configure as configure_trips;
pub use wallet::configure as configure_wallet;
