//! Wallet handlers

use crate::dto::{ApiResponse, WalletResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use busline_auth::AuthenticatedUser;
use busline_core::traits::CacheService;
use busline_core::AppError;
use tracing::instrument;

/// Balance of the caller's wallet
///
/// GET /api/v1/wallet
#[instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn get_wallet<C: CacheService + 'static>(
    state: web::Data<AppState<C>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let balance = state
        .wallets
        .balance(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(WalletResponse {
        user_id: user.user_id,
        balance,
    })))
}

/// Configure wallet routes
pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/wallet", web::get().to(get_wallet::<C>));
}
