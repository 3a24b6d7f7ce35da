//! Distributed seat lock
//!
//! A lock is a key in the shared store holding a random owner token, created
//! with `SET NX EX` and removed with a compare-and-delete. A request that
//! finds the key taken fails at once with `Conflict`; it never waits. The
//! TTL bounds how long a crashed holder can block a seat.

use busline_cache::keys::seat_lock_key;
use busline_core::{traits::CacheService, AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Grants exclusive, time-bounded ownership of a (trip, seat) pair
pub struct SeatLockManager<C: CacheService + 'static> {
    cache: Arc<C>,
    ttl_secs: u64,
}

impl<C: CacheService + 'static> SeatLockManager<C> {
    pub fn new(cache: Arc<C>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Try to take the lock for a seat
    ///
    /// # Errors
    ///
    /// - `Conflict` if another caller holds the lock
    /// - `Cache`/`CacheConnection` if the store is unreachable
    #[instrument(skip(self))]
    pub async fn acquire(&self, trip_id: i32, seat_number: i32) -> AppResult<SeatLockGuard<C>> {
        let key = seat_lock_key(trip_id, seat_number);
        let token = Uuid::new_v4().to_string();

        if !self.cache.set_nx_ex(&key, &token, self.ttl_secs).await? {
            debug!("Seat lock {} is held by another request", key);
            return Err(AppError::Conflict(format!(
                "Seat {} on trip {} is being reserved by another request",
                seat_number, trip_id
            )));
        }

        debug!("Acquired seat lock {}", key);
        Ok(SeatLockGuard {
            cache: Arc::clone(&self.cache),
            key,
            token,
            released: false,
        })
    }
}

/// Ownership of one seat lock
///
/// Call [`SeatLockGuard::release`] on every path out of the protected
/// section. A guard dropped without release schedules the compare-and-delete
/// on the current tokio runtime; outside a runtime the TTL reclaims the key.
pub struct SeatLockGuard<C: CacheService + 'static> {
    cache: Arc<C>,
    key: String,
    token: String,
    released: bool,
}

impl<C: CacheService + 'static> SeatLockGuard<C> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Delete the lock if this guard still owns it
    ///
    /// Returns `false` when the lock had expired and possibly been taken by
    /// someone else; that is not an error.
    pub async fn release(mut self) -> AppResult<bool> {
        self.released = true;
        let deleted = self.cache.delete_if_equals(&self.key, &self.token).await?;
        if deleted {
            debug!("Released seat lock {}", self.key);
        } else {
            debug!("Seat lock {} was no longer ours", self.key);
        }
        Ok(deleted)
    }
}

impl<C: CacheService + 'static> Drop for SeatLockGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = Arc::clone(&self.cache);
                handle.spawn(async move {
                    if let Err(e) = cache.delete_if_equals(&key, &token).await {
                        warn!("Failed to release seat lock {}: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("No runtime to release seat lock {}; left to expire", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busline_cache::MemoryCache;
    use tokio::time::Duration;

    fn manager() -> (Arc<MemoryCache>, SeatLockManager<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (cache.clone(), SeatLockManager::new(cache, 10))
    }

    #[tokio::test]
    async fn test_second_acquire_conflicts() {
        let (_, locks) = manager();

        let guard = locks.acquire(1, 5).await.unwrap();
        assert_eq!(guard.key(), "lock:seat:1:5");

        let err = locks.acquire(1, 5).await.err().unwrap();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(locks.acquire(1, 6).await.is_ok());
        assert!(guard.release().await.unwrap());
        assert!(locks.acquire(1, 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (_, locks) = manager();

        let a = locks.acquire(1, 1).await.unwrap();
        let b = locks.acquire(1, 2).await.unwrap();
        assert_ne!(a.token(), b.token());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_after_expiry_is_noop() {
        let (cache, locks) = manager();

        let stale = locks.acquire(2, 3).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        let current = locks.acquire(2, 3).await.unwrap();
        assert!(!stale.release().await.unwrap());
        assert!(cache.exists(current.key()).await.unwrap());

        assert!(current.release().await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_lock() {
        let (cache, locks) = manager();

        let guard = locks.acquire(3, 1).await.unwrap();
        drop(guard);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!cache.exists("lock:seat:3:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_carries_ttl() {
        let (cache, locks) = manager();

        let guard = locks.acquire(4, 1).await.unwrap();
        let ttl = cache.ttl(guard.key()).unwrap();
        assert!(ttl <= Duration::from_secs(10));
        assert!(ttl > Duration::from_secs(8));
    }
}
