//! Booking handlers
//!
//! Reservation, cancellation and booking history for the authenticated user.

use crate::dto::{
    ApiResponse, BookingHistoryItem, BookingHistoryResponse, CancelResponse, ReserveRequest,
    ReserveResponse,
};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use busline_auth::AuthenticatedUser;
use busline_core::traits::CacheService;
use busline_core::AppError;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Reserve a seat, paying from the caller's wallet
///
/// POST /api/v1/booking/reserve
#[instrument(skip(state, user, req), fields(user_id = user.user_id))]
pub async fn reserve<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    user: AuthenticatedUser,
    req: web::Json<ReserveRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Reservation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(
        trip_id = req.trip_id,
        seat_number = req.seat_number,
        "Reserving seat"
    );

    let receipt = state
        .reservations
        .reserve(user.user_id, req.trip_id, req.seat_number)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        ReserveResponse::from(receipt),
        "Ticket successfully reserved",
    )))
}

/// Cancel one of the caller's bookings; the refund is applied in background
///
/// POST /api/v1/booking/cancel/{booking_id}
#[instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn cancel<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();

    let ticket = state.cancellations.cancel(booking_id, user.user_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        CancelResponse::from(ticket),
        "Cancellation request received. The amount will be refunded to your wallet shortly.",
    )))
}

/// Booking history of the caller, newest first
///
/// GET /api/v1/booking/my-bookings
#[instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn my_bookings<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let now = state.clock.now();

    let bookings: Vec<BookingHistoryItem> = state
        .bookings
        .list_for_user(user.user_id)
        .await?
        .into_iter()
        .map(|summary| BookingHistoryItem::from_summary(summary, now))
        .collect();

    let total = bookings.len();
    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingHistoryResponse {
        bookings,
        total,
    })))
}

/// Configure booking routes
pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/booking")
            .route("/reserve", web::post().to(reserve::<C>))
            .route("/my-bookings", web::get().to(my_bookings::<C>))
            .route("/cancel/{booking_id}", web::post().to(cancel::<C>)),
    );
}
