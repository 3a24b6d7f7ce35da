//! Health check handler

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use busline_core::traits::CacheService;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Check every registered dependency
///
/// GET /api/v1/health
pub async fn health<C: CacheService + 'static>(state: web::Data<AppState<C>>) -> HttpResponse {
    let results = join_all(state.health_checks.iter().map(|c| c.check())).await;

    let mut checks = Map::new();
    let mut healthy = true;
    for (check, result) in state.health_checks.iter().zip(results) {
        let status = match result {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                warn!(dependency = check.name(), error = %e, "Health check failed");
                healthy = false;
                e.to_string()
            }
        };
        checks.insert(check.name().to_string(), Value::String(status));
    }

    if healthy {
        HttpResponse::Ok().json(json!({ "status": "healthy", "checks": checks }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({ "status": "unhealthy", "checks": checks }))
    }
}

/// Configure health route
pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::<C>));
}
