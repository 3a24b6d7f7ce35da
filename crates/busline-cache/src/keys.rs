//! Cache key constants and builders for Busline
//!
//! Provides standardized key naming patterns for everything kept in the
//! shared key-value store, preventing collisions between processes.
//!
//! # Key Patterns
//!
//! - `lock:seat:{trip_id}:{seat_number}` - Seat lock holding an ownership token
//! - `daily_limit:{user_id}:{date}` - Successful reservations of a user on a date
//!
//! # Example
//!
//! ```
//! use busline_cache::keys;
//! use chrono::NaiveDate;
//!
//! assert_eq!(keys::seat_lock_key(1, 10), "lock:seat:1:10");
//!
//! let date = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
//! assert_eq!(keys::daily_limit_key(7, date), "daily_limit:7:2025-11-20");
//! ```

use chrono::NaiveDate;

/// Prefix for seat locks
///
/// Format: `lock:seat:{trip_id}:{seat_number}`
pub const SEAT_LOCK_PREFIX: &str = "lock:seat";

/// Prefix for per-user daily reservation counters
///
/// Format: `daily_limit:{user_id}:{date}`
pub const DAILY_LIMIT_PREFIX: &str = "daily_limit";

/// Build the lock key for a seat on a trip
///
/// # Example
///
/// ```
/// use busline_cache::keys::seat_lock_key;
///
/// assert_eq!(seat_lock_key(3, 12), "lock:seat:3:12");
/// ```
pub fn seat_lock_key(trip_id: i32, seat_number: i32) -> String {
    format!("{}:{}:{}", SEAT_LOCK_PREFIX, trip_id, seat_number)
}

/// Build the daily counter key for a user on a calendar date
///
/// The date is rendered as ISO-8601 (`YYYY-MM-DD`), so a new counter starts
/// every day without any rollover logic.
pub fn daily_limit_key(user_id: i32, date: NaiveDate) -> String {
    format!("{}:{}:{}", DAILY_LIMIT_PREFIX, user_id, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_lock_key() {
        assert_eq!(seat_lock_key(1, 10), "lock:seat:1:10");
        assert_eq!(seat_lock_key(42, 1), "lock:seat:42:1");
    }

    #[test]
    fn test_daily_limit_key() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(daily_limit_key(9, date), "daily_limit:9:2025-01-05");

        let next = date.succ_opt().unwrap();
        assert_ne!(daily_limit_key(9, date), daily_limit_key(9, next));
    }

    #[test]
    fn test_key_uniqueness() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let keys = vec![
            seat_lock_key(1, 2),
            seat_lock_key(12, 1),
            seat_lock_key(1, 21),
            daily_limit_key(1, date),
        ];

        let unique_count = keys.iter().collect::<std::collections::HashSet<_>>().len();
        assert_eq!(unique_count, keys.len());
    }
}
