//! Per-user daily reservation limit
//!
//! Counts successful reservations per user and calendar day in the shared
//! store. The check is read-only; only a committed reservation increments,
//! so a request that fails after the check never consumes quota. Counters
//! expire on their own a day after their first increment.

use busline_cache::keys::daily_limit_key;
use busline_core::{traits::CacheService, AppError, AppResult, Clock};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct DailyLimiter<C: CacheService> {
    cache: Arc<C>,
    clock: Arc<dyn Clock>,
    limit: u32,
    ttl_secs: u64,
}

impl<C: CacheService> DailyLimiter<C> {
    pub fn new(cache: Arc<C>, clock: Arc<dyn Clock>, limit: u32, ttl_secs: u64) -> Self {
        Self {
            cache,
            clock,
            limit,
            ttl_secs,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn key(&self, user_id: i32) -> String {
        daily_limit_key(user_id, self.clock.today())
    }

    /// Successful reservations made today
    pub async fn count(&self, user_id: i32) -> AppResult<i64> {
        let count: Option<i64> = self.cache.get(&self.key(user_id)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Reject the request if today's quota is used up
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` once the count has reached the limit
    #[instrument(skip(self))]
    pub async fn check(&self, user_id: i32) -> AppResult<()> {
        let count = self.count(user_id).await?;

        if count >= i64::from(self.limit) {
            warn!(
                "User {} reached the daily limit of {} reservations",
                user_id, self.limit
            );
            return Err(AppError::LimitExceeded { limit: self.limit });
        }

        debug!("User {} has made {} reservations today", user_id, count);
        Ok(())
    }

    /// Record one committed reservation and return the new count
    #[instrument(skip(self))]
    pub async fn increment(&self, user_id: i32) -> AppResult<i64> {
        self.cache
            .incr_with_expiry(&self.key(user_id), self.ttl_secs)
            .await
    }
}
