//! Trip handlers

use crate::dto::{ApiResponse, SeatResponse, TripSeatsResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use busline_core::models::TripSearch;
use busline_core::traits::CacheService;
use busline_core::AppError;
use tracing::{instrument, warn};
use validator::Validate;

/// Search trips by route, ordered by price
///
/// GET /api/v1/trips/available?origin=&destination=&sort=cheapest|expensive&page=&per_page=
#[instrument(skip(state))]
pub async fn available_trips<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    query: web::Query<TripSearch>,
) -> Result<HttpResponse, AppError> {
    let search = query.into_inner();
    search.validate().map_err(|e| {
        warn!("Trip search validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let page = state.trips.search_trips(&search).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

/// Seat map of a trip
///
/// GET /api/v1/trips/{id}/seats
#[instrument(skip(state))]
pub async fn trip_seats<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let trip_id = path.into_inner();

    let trip = state
        .trips
        .find_by_id(trip_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", trip_id)))?;

    let seats: Vec<SeatResponse> = state
        .trips
        .seats(trip_id)
        .await?
        .into_iter()
        .map(SeatResponse::from)
        .collect();
    let available = seats.iter().filter(|s| !s.is_reserved).count();

    Ok(HttpResponse::Ok().json(ApiResponse::success(TripSeatsResponse {
        trip_id,
        price: trip.price,
        departure_time: trip.departure_time,
        seats,
        available,
    })))
}

/// Configure trip routes
pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/trips")
            .route("/available", web::get().to(available_trips::<C>))
            .route("/{id}/seats", web::get().to(trip_seats::<C>)),
    );
}
