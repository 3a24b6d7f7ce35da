//! Trip DTOs

use busline_core::models::{Bus, Seat, Trip};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Created or fetched trip
#[derive(Debug, Clone, Serialize)]
pub struct TripResponse {
    pub id: i32,
    pub route_id: i32,
    pub bus_id: i32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Decimal,
    pub capacity: i32,
}

impl From<Trip> for TripResponse {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            route_id: trip.route_id,
            bus_id: trip.bus_id,
            departure_time: trip.departure_time,
            arrival_time: trip.arrival_time,
            price: trip.price,
            capacity: trip.capacity,
        }
    }
}

/// Seat with its reservation flag
///
/// The flag is a snapshot; a reservation may still lose the seat.
#[derive(Debug, Clone, Serialize)]
pub struct SeatResponse {
    pub seat_number: i32,
    pub is_reserved: bool,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        Self {
            seat_number: seat.seat_number,
            is_reserved: seat.is_reserved,
        }
    }
}

/// Seat map of one trip
#[derive(Debug, Clone, Serialize)]
pub struct TripSeatsResponse {
    pub trip_id: i32,
    pub price: Decimal,
    pub departure_time: DateTime<Utc>,
    pub seats: Vec<SeatResponse>,
    pub available: usize,
}

/// Registered bus
#[derive(Debug, Clone, Serialize)]
pub struct BusResponse {
    pub id: i32,
    pub plate_number: String,
    pub capacity: i32,
    pub is_vip: bool,
}

impl From<Bus> for BusResponse {
    fn from(bus: Bus) -> Self {
        Self {
            id: bus.id,
            plate_number: bus.plate_number,
            capacity: bus.capacity,
            is_vip: bus.is_vip,
        }
    }
}
