//! Data Transfer Objects (DTOs) for API requests and responses

pub mod booking;
pub mod common;
pub mod trip;
pub mod wallet;

pub use booking::*;
pub use common::*;
pub use trip::*;
pub use wallet::*;
