//! Busline - Seat Reservation Backend
//!
//! HTTP server for reserving and cancelling bus seats against prepaid
//! wallets, with Redis seat locks and daily throttling.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use busline_api::{
    configure_admin, configure_bookings, configure_health, configure_trips, configure_wallet,
    AppState, DatabaseCheck,
};
use busline_auth::JwtService;
use busline_cache::RedisCache;
use busline_core::{AppConfig, Clock, SystemClock};
use busline_db::{create_pool, PgBookingStore, PgTripRepository, PgWalletRepository};
use busline_services::refund_pipeline;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REFUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configure all API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_health::<RedisCache>)
            .configure(configure_bookings::<RedisCache>)
            .configure(configure_trips::<RedisCache>)
            .configure(configure_wallet::<RedisCache>)
            .configure(configure_admin::<RedisCache>),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "busline={},busline_api={},busline_services={},busline_db={},busline_cache={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

fn json_error_response(message: String, code: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": code,
        "message": message,
        "status": 400
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Busline v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;

    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_minutes * 60,
    ));

    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    info!("Connecting to Redis...");
    let cache = Arc::new(
        RedisCache::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    let bookings = Arc::new(PgBookingStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (refunds, refund_worker) = refund_pipeline(bookings.clone(), &config.booking);
    let refund_handle = refund_worker.spawn();

    let state = web::Data::new(
        AppState::new(
            bookings,
            Arc::new(PgTripRepository::new(pool.clone())),
            Arc::new(PgWalletRepository::new(pool.clone())),
            cache.clone(),
            clock,
            refunds,
            &config.booking,
        )
        .with_health_check(Arc::new(DatabaseCheck::new(pool)))
        .with_health_check(cache),
    );

    info!(
        daily_limit = config.booking.daily_limit,
        seat_lock_ttl_secs = config.booking.seat_lock_ttl_secs,
        "Reservation engine ready"
    );

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let app_state = state.clone();
    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    json_error_response(message, "invalid_json"),
                )
                .into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                let message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    json_error_response(message, "invalid_path"),
                )
                .into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    json_error_response(message, "invalid_query"),
                )
                .into()
            }))
            // Middleware
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    // Dropping the last queue handle lets the worker drain and exit
    drop(state);
    match tokio::time::timeout(REFUND_DRAIN_TIMEOUT, refund_handle).await {
        Ok(joined) => joined.context("Refund worker terminated abnormally")?,
        Err(_) => warn!("Refund worker still busy after shutdown, pending refunds are dropped"),
    }

    info!("Busline stopped");
    Ok(())
}
