//! In-process implementation of the store traits
//!
//! Holds trips, seats, wallets and bookings behind one mutex. Each trait
//! method takes the lock once and validates before it mutates, which gives
//! the same all-or-nothing behaviour as the PostgreSQL transactions.

use async_trait::async_trait;
use busline_core::{
    models::{
        AvailableTrip, Booking, BookingReceipt, BookingStatus, BookingSummary, Bus,
        CancellationCandidate, NewBus, NewTrip, RefundOutcome, Seat, SeatReservation, Trip,
        TripPage, TripSearch, TripSort,
    },
    traits::{BookingStore, TripRepository, WalletRepository},
    AppError, AppResult,
};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
struct Route {
    origin: String,
    destination: String,
}

#[derive(Default)]
struct State {
    routes: HashMap<i32, Route>,
    buses: BTreeMap<i32, Bus>,
    trips: HashMap<i32, Trip>,
    seats: BTreeMap<i32, Seat>,
    wallets: HashMap<i32, Decimal>,
    bookings: BTreeMap<i64, Booking>,
    next_route_id: i32,
    next_bus_id: i32,
    next_trip_id: i32,
    next_seat_id: i32,
    next_booking_id: i64,
    /// Number of upcoming refunds that fail with a transient error
    failing_refunds: u32,
}

impl State {
    fn seat_by_number(&self, trip_id: i32, seat_number: i32) -> Option<&Seat> {
        self.seats
            .values()
            .find(|s| s.trip_id == trip_id && s.seat_number == seat_number)
    }

    fn insert_bus(&mut self, bus: &NewBus) -> AppResult<Bus> {
        if self.buses.values().any(|b| b.plate_number == bus.plate_number) {
            return Err(AppError::AlreadyExists(
                "Plate number already registered".to_string(),
            ));
        }

        self.next_bus_id += 1;
        let created = Bus {
            id: self.next_bus_id,
            plate_number: bus.plate_number.clone(),
            capacity: bus.capacity,
            is_vip: bus.is_vip,
        };
        self.buses.insert(created.id, created.clone());
        Ok(created)
    }

    fn free_seats(&self, trip_id: i32) -> Vec<i32> {
        let mut free: Vec<i32> = self
            .seats
            .values()
            .filter(|s| s.trip_id == trip_id && !s.is_reserved)
            .map(|s| s.seat_number)
            .collect();
        free.sort_unstable();
        free
    }
}

/// Memory-backed booking, trip and wallet store
#[derive(Clone, Default)]
pub struct MemoryBookingStore {
    state: Arc<Mutex<State>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and return its id
    pub fn add_route(&self, origin: &str, destination: &str) -> i32 {
        let mut state = self.state.lock();
        state.next_route_id += 1;
        let id = state.next_route_id;
        state.routes.insert(
            id,
            Route {
                origin: origin.to_string(),
                destination: destination.to_string(),
            },
        );
        id
    }

    /// Register a bus with the given seat count and return its id
    pub fn add_bus(&self, capacity: i32) -> i32 {
        let mut state = self.state.lock();
        state.next_bus_id += 1;
        let id = state.next_bus_id;
        state.buses.insert(
            id,
            Bus {
                id,
                plate_number: format!("MEM-{}", id),
                capacity,
                is_vip: false,
            },
        );
        id
    }

    /// Open a wallet, replacing any existing balance
    pub fn open_wallet(&self, user_id: i32, balance: Decimal) {
        self.state.lock().wallets.insert(user_id, balance);
    }

    /// Remove a user's wallet, leaving their bookings in place
    pub fn close_wallet(&self, user_id: i32) {
        self.state.lock().wallets.remove(&user_id);
    }

    /// Make the next `count` refunds fail with a transient database error
    pub fn fail_next_refunds(&self, count: u32) {
        self.state.lock().failing_refunds = count;
    }

    /// Current state of a seat
    pub fn seat(&self, trip_id: i32, seat_number: i32) -> Option<Seat> {
        self.state.lock().seat_by_number(trip_id, seat_number).cloned()
    }

    pub fn booking(&self, booking_id: i64) -> Option<Booking> {
        self.state.lock().bookings.get(&booking_id).cloned()
    }

    /// Number of bookings ever created
    pub fn booking_count(&self) -> usize {
        self.state.lock().bookings.len()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn reserve_seat(&self, request: &SeatReservation) -> AppResult<BookingReceipt> {
        let mut state = self.state.lock();

        let price = state
            .trips
            .get(&request.trip_id)
            .map(|t| t.price)
            .ok_or_else(|| AppError::SeatUnavailable {
                trip_id: request.trip_id,
                seat_number: request.seat_number,
                available_seats: Vec::new(),
            })?;

        let seat_id = match state.seat_by_number(request.trip_id, request.seat_number) {
            Some(seat) if !seat.is_reserved => seat.id,
            _ => {
                return Err(AppError::SeatUnavailable {
                    trip_id: request.trip_id,
                    seat_number: request.seat_number,
                    available_seats: state.free_seats(request.trip_id),
                })
            }
        };

        let balance = match state.wallets.get(&request.user_id) {
            Some(balance) => *balance,
            None => {
                error!(user_id = request.user_id, "User has no wallet");
                return Err(AppError::WalletNotFound(request.user_id));
            }
        };

        if balance < price {
            warn!(
                "Insufficient balance for user {}: required {}, available {}",
                request.user_id, price, balance
            );
            return Err(AppError::InsufficientFunds {
                required: price,
                current_balance: balance,
            });
        }

        state.wallets.insert(request.user_id, balance - price);
        if let Some(seat) = state.seats.get_mut(&seat_id) {
            seat.is_reserved = true;
        }

        state.next_booking_id += 1;
        let booking_id = state.next_booking_id;
        state.bookings.insert(
            booking_id,
            Booking {
                id: booking_id,
                user_id: request.user_id,
                trip_id: request.trip_id,
                seat_id,
                price_paid: price,
                status: BookingStatus::Confirmed,
                booking_date: request.booking_date,
                created_at: Utc::now(),
            },
        );

        Ok(BookingReceipt {
            booking_id,
            trip_id: request.trip_id,
            seat_number: request.seat_number,
            price_paid: price,
        })
    }

    async fn find_for_cancellation(
        &self,
        booking_id: i64,
        user_id: i32,
    ) -> AppResult<Option<CancellationCandidate>> {
        let state = self.state.lock();

        let candidate = state
            .bookings
            .get(&booking_id)
            .filter(|b| b.user_id == user_id)
            .and_then(|b| {
                state.trips.get(&b.trip_id).map(|t| CancellationCandidate {
                    booking_id: b.id,
                    user_id: b.user_id,
                    price_paid: b.price_paid,
                    status: b.status,
                    departure_time: t.departure_time,
                })
            });

        Ok(candidate)
    }

    async fn refund_booking(&self, booking_id: i64) -> AppResult<RefundOutcome> {
        let mut state = self.state.lock();

        if state.failing_refunds > 0 {
            state.failing_refunds -= 1;
            return Err(AppError::Database("connection reset".to_string()));
        }

        let booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if booking.status.is_cancelled() {
            return Ok(RefundOutcome::AlreadyCancelled);
        }

        let balance = state.wallets.get_mut(&booking.user_id).ok_or_else(|| {
            error!(user_id = booking.user_id, "Refund target has no wallet");
            AppError::InternalInvariantViolation(format!(
                "Wallet for user {} missing while refunding booking {}",
                booking.user_id, booking_id
            ))
        })?;
        *balance += booking.price_paid;

        if let Some(b) = state.bookings.get_mut(&booking_id) {
            b.status = BookingStatus::Cancelled;
        }
        if let Some(seat) = state.seats.get_mut(&booking.seat_id) {
            seat.is_reserved = false;
        }

        info!(
            "Refunded booking {}: {} to user {}",
            booking_id, booking.price_paid, booking.user_id
        );

        Ok(RefundOutcome::Refunded {
            user_id: booking.user_id,
            amount: booking.price_paid,
        })
    }

    async fn available_seats(&self, trip_id: i32) -> AppResult<Vec<i32>> {
        Ok(self.state.lock().free_seats(trip_id))
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookingSummary>> {
        let state = self.state.lock();

        let mut summaries: Vec<BookingSummary> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .filter_map(|b| {
                let trip = state.trips.get(&b.trip_id)?;
                let route = state.routes.get(&trip.route_id)?;
                let seat = state.seats.get(&b.seat_id)?;
                Some(BookingSummary {
                    id: b.id,
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                    departure_time: trip.departure_time,
                    seat_number: seat.seat_number,
                    price_paid: b.price_paid,
                    status: b.status,
                    booking_date: b.booking_date,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.booking_date.cmp(&a.booking_date).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }
}

#[async_trait]
impl TripRepository for MemoryBookingStore {
    async fn create_trip(&self, trip: &NewTrip) -> AppResult<Trip> {
        let mut state = self.state.lock();

        let capacity = match (
            state.routes.contains_key(&trip.route_id),
            state.buses.get(&trip.bus_id),
        ) {
            (true, Some(bus)) => bus.capacity,
            _ => return Err(AppError::NotFound("Route or bus not found".to_string())),
        };

        state.next_trip_id += 1;
        let created = Trip {
            id: state.next_trip_id,
            route_id: trip.route_id,
            bus_id: trip.bus_id,
            departure_time: trip.departure_time,
            arrival_time: trip.arrival_time,
            price: trip.price,
            capacity,
        };
        state.trips.insert(created.id, created.clone());

        for seat_number in 1..=capacity {
            state.next_seat_id += 1;
            let id = state.next_seat_id;
            state.seats.insert(
                id,
                Seat {
                    id,
                    trip_id: created.id,
                    seat_number,
                    is_reserved: false,
                },
            );
        }

        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Trip>> {
        Ok(self.state.lock().trips.get(&id).cloned())
    }

    async fn seats(&self, trip_id: i32) -> AppResult<Vec<Seat>> {
        let state = self.state.lock();
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.trip_id == trip_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.seat_number);
        Ok(seats)
    }

    async fn create_bus(&self, bus: &NewBus) -> AppResult<Bus> {
        let created = self.state.lock().insert_bus(bus)?;
        info!("Created bus {} with {} seats", created.id, created.capacity);
        Ok(created)
    }

    async fn list_buses(&self) -> AppResult<Vec<Bus>> {
        Ok(self.state.lock().buses.values().cloned().collect())
    }

    async fn search_trips(&self, search: &TripSearch) -> AppResult<TripPage> {
        let state = self.state.lock();

        let mut matching: Vec<AvailableTrip> = state
            .trips
            .values()
            .filter_map(|trip| {
                let route = state.routes.get(&trip.route_id)?;
                if !search.matches(&route.origin, &route.destination) {
                    return None;
                }
                let available_seats = state
                    .seats
                    .values()
                    .filter(|s| s.trip_id == trip.id && !s.is_reserved)
                    .count() as i64;
                Some(AvailableTrip {
                    trip_id: trip.id,
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                    departure_time: trip.departure_time,
                    price: trip.price,
                    available_seats,
                })
            })
            .collect();

        matching.sort_by(|a, b| {
            let by_price = match search.sort {
                TripSort::Cheapest => a.price.cmp(&b.price),
                TripSort::Expensive => b.price.cmp(&a.price),
            };
            by_price.then(a.trip_id.cmp(&b.trip_id))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(search.offset().max(0) as usize)
            .take(search.per_page.max(0) as usize)
            .collect();

        Ok(TripPage {
            page: search.page,
            per_page: search.per_page,
            total,
            items,
        })
    }
}

#[async_trait]
impl WalletRepository for MemoryBookingStore {
    async fn balance(&self, user_id: i32) -> AppResult<Option<Decimal>> {
        Ok(self.state.lock().wallets.get(&user_id).copied())
    }

    async fn top_up(&self, user_id: i32, amount: Decimal) -> AppResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Top-up amount must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock();
        let balance = state
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("Wallet for user {} not found", user_id)))?;
        *balance += amount;
        Ok(*balance)
    }
}
