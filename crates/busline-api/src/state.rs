//! Shared application state
//!
//! Built once at start-up and handed to every worker as `web::Data`. The
//! stores sit behind trait objects so the same handlers serve PostgreSQL and
//! the in-memory stores; the cache stays a type parameter because its
//! JSON accessors are generic.

use async_trait::async_trait;
use busline_cache::RedisCache;
use busline_core::config::BookingConfig;
use busline_core::traits::{BookingStore, CacheService, TripRepository, WalletRepository};
use busline_core::{AppResult, Clock};
use busline_services::{CancellationService, RefundQueue, ReservationService};
use sqlx::PgPool;
use std::sync::Arc;

/// Dependency checked by `GET /health`
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Key under which the result is reported
    fn name(&self) -> &'static str;

    async fn check(&self) -> AppResult<()>;
}

/// PostgreSQL reachability
pub struct DatabaseCheck {
    pool: PgPool,
}

impl DatabaseCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for DatabaseCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> AppResult<()> {
        busline_db::ping(&self.pool).await
    }
}

#[async_trait]
impl HealthCheck for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> AppResult<()> {
        self.ping().await
    }
}

/// Services and stores shared by all handlers
pub struct AppState<C: CacheService + 'static> {
    pub reservations: ReservationService<dyn BookingStore, C>,
    pub cancellations: CancellationService<dyn BookingStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub trips: Arc<dyn TripRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub clock: Arc<dyn Clock>,
    pub health_checks: Vec<Arc<dyn HealthCheck>>,
}

impl<C: CacheService + 'static> AppState<C> {
    /// Wire the reservation and cancellation services
    ///
    /// `refunds` is the sending half of the refund pipeline; its worker must
    /// be spawned by the caller against the same `bookings` store.
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        trips: Arc<dyn TripRepository>,
        wallets: Arc<dyn WalletRepository>,
        cache: Arc<C>,
        clock: Arc<dyn Clock>,
        refunds: RefundQueue,
        config: &BookingConfig,
    ) -> Self {
        Self {
            reservations: ReservationService::new(
                Arc::clone(&bookings),
                cache,
                Arc::clone(&clock),
                config,
            ),
            cancellations: CancellationService::new(
                Arc::clone(&bookings),
                refunds,
                Arc::clone(&clock),
            ),
            bookings,
            trips,
            wallets,
            clock,
            health_checks: Vec::new(),
        }
    }

    pub fn with_health_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.health_checks.push(check);
        self
    }
}
