//! Busline Database Layer
//!
//! This crate provides PostgreSQL access and the transactional store
//! implementations for the Busline reservation engine. It includes:
//!
//! - Connection pool management with sqlx
//! - `PgBookingStore`: reserve, refund and history queries with row locks
//! - `PgTripRepository` and `PgWalletRepository`
//! - `MemoryBookingStore`, an in-process store with the same atomicity
//!   guarantees, for tests and local runs

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::MemoryBookingStore;
pub use pool::{create_pool, ping};
pub use repositories::*;

// Re-export commonly used types
pub use busline_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
