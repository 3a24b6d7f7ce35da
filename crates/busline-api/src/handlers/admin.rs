//! Admin handlers
//!
//! Fleet registration, trip scheduling and wallet credits. Every route
//! requires the admin role.

use crate::dto::{ApiResponse, BusResponse, ChargeWalletRequest, TripResponse, WalletResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use busline_auth::AdminUser;
use busline_core::models::{NewBus, NewTrip};
use busline_core::traits::CacheService;
use busline_core::AppError;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Register a bus
///
/// POST /api/v1/admin/bus
#[instrument(skip(state, admin, req), fields(admin_id = admin.user_id))]
pub async fn create_bus<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    admin: AdminUser,
    req: web::Json<NewBus>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Bus validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let bus = state.trips.create_bus(&req).await?;

    info!(bus_id = bus.id, plate_number = %bus.plate_number, "Bus registered");

    Ok(HttpResponse::Created().json(ApiResponse::success(BusResponse::from(bus))))
}

/// List the fleet
///
/// GET /api/v1/admin/buses
#[instrument(skip(state, admin), fields(admin_id = admin.user_id))]
pub async fn list_buses<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let buses: Vec<BusResponse> = state
        .trips
        .list_buses()
        .await?
        .into_iter()
        .map(BusResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(buses)))
}

/// Schedule a trip and generate its seats
///
/// POST /api/v1/admin/trips
#[instrument(skip(state, admin, req), fields(admin_id = admin.user_id))]
pub async fn create_trip<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    admin: AdminUser,
    req: web::Json<NewTrip>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Trip validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let trip = state.trips.create_trip(&req).await?;

    info!(
        trip_id = trip.id,
        capacity = trip.capacity,
        "Trip created with seats"
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(TripResponse::from(trip))))
}

/// Credit a user's wallet
///
/// POST /api/v1/admin/wallets/{user_id}/charge
#[instrument(skip(state, admin, req), fields(admin_id = admin.user_id))]
pub async fn charge_wallet<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    admin: AdminUser,
    path: web::Path<i32>,
    req: web::Json<ChargeWalletRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Wallet charge validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let user_id = path.into_inner();
    let balance = state.wallets.top_up(user_id, req.amount).await?;

    info!(user_id, amount = %req.amount, "Wallet charged");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        WalletResponse { user_id, balance },
        "Wallet charged",
    )))
}

/// Configure admin routes
pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/bus", web::post().to(create_bus::<C>))
            .route("/buses", web::get().to(list_buses::<C>))
            .route("/trips", web::post().to(create_trip::<C>))
            .route("/wallets/{user_id}/charge", web::post().to(charge_wallet::<C>)),
    );
}
