//! Bus, trip and seat models
//!
//! A trip runs one bus on one route at a fixed price. Its seats are created
//! together with the trip, numbered 1..=capacity, and are never added later.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Scheduled trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: i32,
    pub route_id: i32,
    pub bus_id: i32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Applies to every seat on the trip
    pub price: Decimal,
    /// Seat count of the bus
    pub capacity: i32,
}

impl Trip {
    /// Whether the bus has left as of `now`
    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        now >= self.departure_time
    }
}

/// Trip creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct NewTrip {
    #[validate(range(min = 1))]
    pub route_id: i32,
    #[validate(range(min = 1))]
    pub bus_id: i32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(ValidationError::new("price_must_be_positive"));
    }
    Ok(())
}

fn validate_schedule(trip: &NewTrip) -> Result<(), ValidationError> {
    if trip.arrival_time <= trip.departure_time {
        return Err(ValidationError::new("arrival_before_departure"));
    }
    Ok(())
}

/// Seat on a trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i32,
    pub trip_id: i32,
    /// Unique within the trip
    pub seat_number: i32,
    /// True exactly when a confirmed booking references this seat
    pub is_reserved: bool,
}

/// Registered bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub id: i32,
    /// Unique across the fleet
    pub plate_number: String,
    pub capacity: i32,
    pub is_vip: bool,
}

/// Bus registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBus {
    #[validate(length(min = 1, max = 20))]
    pub plate_number: String,
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, max = 100))]
    pub capacity: i32,
    #[serde(default)]
    pub is_vip: bool,
}

fn default_capacity() -> i32 {
    44
}

/// Price ordering of a trip search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripSort {
    #[default]
    Cheapest,
    Expensive,
}

/// Trip search filter
///
/// Missing origin or destination matches every route.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TripSearch {
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[serde(default)]
    pub sort: TripSort,
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: i64,
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 100))]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl Default for TripSearch {
    fn default() -> Self {
        Self {
            origin: None,
            destination: None,
            sort: TripSort::default(),
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl TripSearch {
    /// Rows skipped before the requested page
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    /// Whether a route passes the origin and destination filters
    pub fn matches(&self, origin: &str, destination: &str) -> bool {
        self.origin.as_deref().map_or(true, |o| o == origin)
            && self.destination.as_deref().map_or(true, |d| d == destination)
    }
}

/// Search result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableTrip {
    pub trip_id: i32,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub price: Decimal,
    /// Unreserved seats when the search ran
    pub available_seats: i64,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPage {
    pub page: i64,
    pub per_page: i64,
    /// Matching trips across all pages
    pub total: i64,
    pub items: Vec<AvailableTrip>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn new_trip(price: Decimal, hours: i64) -> NewTrip {
        let departure = Utc::now() + Duration::days(1);
        NewTrip {
            route_id: 1,
            bus_id: 1,
            departure_time: departure,
            arrival_time: departure + Duration::hours(hours),
            price,
        }
    }

    #[test]
    fn test_new_trip_validation() {
        assert!(new_trip(dec!(600000), 6).validate().is_ok());
        assert!(new_trip(dec!(0), 6).validate().is_err());
        assert!(new_trip(dec!(-5), 6).validate().is_err());
        assert!(new_trip(dec!(600000), -1).validate().is_err());
    }

    #[test]
    fn test_new_bus_defaults() {
        let bus: NewBus = serde_json::from_str(r#"{"plate_number": "IR12B345"}"#).unwrap();
        assert_eq!(bus.capacity, 44);
        assert!(!bus.is_vip);
        assert!(bus.validate().is_ok());

        let empty = NewBus {
            plate_number: String::new(),
            capacity: 44,
            is_vip: false,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_trip_search_paging() {
        let search = TripSearch {
            page: 3,
            per_page: 10,
            ..Default::default()
        };
        assert_eq!(search.offset(), 20);
        assert!(search.validate().is_ok());

        let zero = TripSearch {
            page: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_trip_search_filters() {
        let search = TripSearch {
            origin: Some("Tehran".to_string()),
            ..Default::default()
        };
        assert!(search.matches("Tehran", "Shiraz"));
        assert!(search.matches("Tehran", "Tabriz"));
        assert!(!search.matches("Mashhad", "Shiraz"));
        assert!(TripSearch::default().matches("Mashhad", "Shiraz"));
    }

    #[test]
    fn test_trip_sort_parsing() {
        let sort: TripSort = serde_json::from_str(r#""expensive""#).unwrap();
        assert_eq!(sort, TripSort::Expensive);
        assert!(serde_json::from_str::<TripSort>(r#""newest""#).is_err());
        assert_eq!(TripSort::default(), TripSort::Cheapest);
    }

    #[test]
    fn test_has_departed() {
        let now = Utc::now();
        let trip = Trip {
            id: 1,
            route_id: 1,
            bus_id: 1,
            departure_time: now,
            arrival_time: now + Duration::hours(5),
            price: dec!(600000),
            capacity: 40,
        };

        assert!(trip.has_departed(now));
        assert!(!trip.has_departed(now - Duration::seconds(1)));
    }
}
