//! Busline Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Busline seat reservation system. It includes:
//!
//! - Domain models (Trip, Seat, Wallet, Booking)
//! - Store traits for the relational store and the shared key-value store
//! - Unified error handling with HTTP response mapping
//! - Application configuration
//! - A clock abstraction for departure checks and daily counters

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
