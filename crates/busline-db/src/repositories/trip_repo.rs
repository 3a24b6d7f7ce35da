//! Trip repository implementation

use busline_core::{
    models::{AvailableTrip, Bus, NewBus, NewTrip, Seat, Trip, TripPage, TripSearch, TripSort},
    traits::TripRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

/// PostgreSQL implementation of TripRepository
pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    /// Create a new trip repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    #[instrument(skip(self, trip), fields(route_id = trip.route_id, bus_id = trip.bus_id))]
    async fn create_trip(&self, trip: &NewTrip) -> AppResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let route: Option<(i32,)> = sqlx::query_as("SELECT id FROM routes WHERE id = $1")
            .bind(trip.route_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find route: {}", e)))?;

        let capacity: Option<(i32,)> = sqlx::query_as("SELECT capacity FROM buses WHERE id = $1")
            .bind(trip.bus_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find bus: {}", e)))?;

        let capacity = match (route, capacity) {
            (Some(_), Some((capacity,))) => capacity,
            _ => return Err(AppError::NotFound("Route or bus not found".to_string())),
        };

        let row = sqlx::query_as::<sqlx::Postgres, TripRow>(
            r#"
            WITH inserted AS (
                INSERT INTO trips (route_id, bus_id, departure_time, arrival_time, price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, route_id, bus_id, departure_time, arrival_time, price
            )
            SELECT inserted.*, $6::INTEGER AS capacity FROM inserted
            "#,
        )
        .bind(trip.route_id)
        .bind(trip.bus_id)
        .bind(trip.departure_time)
        .bind(trip.arrival_time)
        .bind(trip.price)
        .bind(capacity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error creating trip: {}", e);
            AppError::Database(format!("Failed to create trip: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO seats (trip_id, seat_number, is_reserved)
            SELECT $1, n, false FROM generate_series(1, $2) AS n
            "#,
        )
        .bind(row.id)
        .bind(capacity)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error creating seats: {}", e);
            AppError::Database(format!("Failed to create seats: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!("Created trip {} with {} seats", row.id, capacity);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Trip>> {
        debug!("Finding trip by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, TripRow>(
            r#"
            SELECT t.id, t.route_id, t.bus_id, t.departure_time, t.arrival_time,
                   t.price, b.capacity
            FROM trips t
            JOIN buses b ON b.id = t.bus_id
            WHERE t.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding trip {}: {}", id, e);
            AppError::Database(format!("Failed to find trip: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn seats(&self, trip_id: i32) -> AppResult<Vec<Seat>> {
        let rows = sqlx::query_as::<sqlx::Postgres, SeatRow>(
            r#"
            SELECT id, trip_id, seat_number, is_reserved
            FROM seats
            WHERE trip_id = $1
            ORDER BY seat_number
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing seats: {}", e);
            AppError::Database(format!("Failed to list seats: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, bus), fields(plate_number = %bus.plate_number))]
    async fn create_bus(&self, bus: &NewBus) -> AppResult<Bus> {
        let row = sqlx::query_as::<sqlx::Postgres, BusRow>(
            r#"
            INSERT INTO buses (plate_number, capacity, is_vip)
            VALUES ($1, $2, $3)
            ON CONFLICT (plate_number) DO NOTHING
            RETURNING id, plate_number, capacity, is_vip
            "#,
        )
        .bind(&bus.plate_number)
        .bind(bus.capacity)
        .bind(bus.is_vip)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating bus: {}", e);
            AppError::Database(format!("Failed to create bus: {}", e))
        })?;

        let row = row.ok_or_else(|| {
            warn!("Plate number {} already registered", bus.plate_number);
            AppError::AlreadyExists("Plate number already registered".to_string())
        })?;

        info!("Created bus {} with {} seats", row.id, row.capacity);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_buses(&self) -> AppResult<Vec<Bus>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BusRow>(
            "SELECT id, plate_number, capacity, is_vip FROM buses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing buses: {}", e);
            AppError::Database(format!("Failed to list buses: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn search_trips(&self, search: &TripSearch) -> AppResult<TripPage> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM trips t
            JOIN routes r ON r.id = t.route_id
            WHERE ($1::TEXT IS NULL OR r.origin = $1)
              AND ($2::TEXT IS NULL OR r.destination = $2)
            "#,
        )
        .bind(search.origin.as_deref())
        .bind(search.destination.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting trips: {}", e);
            AppError::Database(format!("Failed to count trips: {}", e))
        })?;

        // Ties on price fall back to trip id so pages are stable
        let order = match search.sort {
            TripSort::Cheapest => "t.price ASC, t.id ASC",
            TripSort::Expensive => "t.price DESC, t.id ASC",
        };
        let query = format!(
            r#"
            SELECT t.id AS trip_id, r.origin, r.destination, t.departure_time, t.price,
                   COUNT(s.id) FILTER (WHERE NOT s.is_reserved) AS available_seats
            FROM trips t
            JOIN routes r ON r.id = t.route_id
            LEFT JOIN seats s ON s.trip_id = t.id
            WHERE ($1::TEXT IS NULL OR r.origin = $1)
              AND ($2::TEXT IS NULL OR r.destination = $2)
            GROUP BY t.id, r.origin, r.destination
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            order
        );

        let rows = sqlx::query_as::<sqlx::Postgres, AvailableTripRow>(&query)
            .bind(search.origin.as_deref())
            .bind(search.destination.as_deref())
            .bind(search.per_page)
            .bind(search.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error searching trips: {}", e);
                AppError::Database(format!("Failed to search trips: {}", e))
            })?;

        debug!("Trip search matched {} trips", total);

        Ok(TripPage {
            page: search.page,
            per_page: search.per_page,
            total,
            items: rows.into_iter().map(Into::into).collect(),
        })
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct TripRow {
    id: i32,
    route_id: i32,
    bus_id: i32,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price: Decimal,
    capacity: i32,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Self {
            id: row.id,
            route_id: row.route_id,
            bus_id: row.bus_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price: row.price,
            capacity: row.capacity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    id: i32,
    trip_id: i32,
    seat_number: i32,
    is_reserved: bool,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Self {
            id: row.id,
            trip_id: row.trip_id,
            seat_number: row.seat_number,
            is_reserved: row.is_reserved,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BusRow {
    id: i32,
    plate_number: String,
    capacity: i32,
    is_vip: bool,
}

impl From<BusRow> for Bus {
    fn from(row: BusRow) -> Self {
        Self {
            id: row.id,
            plate_number: row.plate_number,
            capacity: row.capacity,
            is_vip: row.is_vip,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AvailableTripRow {
    trip_id: i32,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    price: Decimal,
    available_seats: i64,
}

impl From<AvailableTripRow> for AvailableTrip {
    fn from(row: AvailableTripRow) -> Self {
        Self {
            trip_id: row.trip_id,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            price: row.price,
            available_seats: row.available_seats,
        }
    }
}
