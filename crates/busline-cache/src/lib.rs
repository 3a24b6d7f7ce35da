//! Redis lock and counter store for Busline
//!
//! Provides the shared key-value store used by the reservation engine:
//! seat locks and per-user daily counters. Implements the `CacheService`
//! trait from busline-core on top of a Redis `ConnectionManager`.
//!
//! # Features
//!
//! - Connection multiplexing via Redis ConnectionManager
//! - Atomic set-if-absent with expiry (`SET NX EX`)
//! - Atomic compare-and-delete and increment-with-expiry through Lua scripts
//! - JSON reads of stored counters
//! - `MemoryCache`, an in-process implementation for tests and single-node runs
//!
//! # Example
//!
//! ```no_run
//! use busline_cache::RedisCache;
//! use busline_core::traits::CacheService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!
//!     let acquired = cache.set_nx_ex("lock:seat:1:10", "token", 10).await?;
//!     assert!(acquired);
//!
//!     let released = cache.delete_if_equals("lock:seat:1:10", "token").await?;
//!     assert!(released);
//!
//!     Ok(())
//! }
//! ```

pub mod keys;
pub mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use busline_core::error::AppError;
use busline_core::traits::CacheService;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError, Script};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

/// Deletes KEYS[1] only while it still holds ARGV[1]
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// INCR KEYS[1]; the first increment also sets the ARGV[1] second TTL
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call("INCR", KEYS[1])
if count == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return count
"#;

/// Redis store with connection multiplexing
///
/// Wraps a Redis ConnectionManager to provide efficient, multiplexed access
/// to Redis. All operations are async and return Results with AppError.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    compare_and_delete: Script,
    incr_with_expiry: Script,
}

impl RedisCache {
    /// Create a new Redis store instance
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheConnection` if the connection fails
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self {
            manager,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            incr_with_expiry: Script::new(INCR_WITH_EXPIRY),
        })
    }

    /// Ping the Redis server to check connectivity
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cache` if the ping fails
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis ping failed: {}", e);
                AppError::Cache(format!("Ping failed: {}", e))
            })?;
        Ok(())
    }

    /// Flush all keys from the current database
    ///
    /// # Warning
    ///
    /// This operation is destructive. Use only in tests.
    #[cfg(test)]
    pub async fn flush_db(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    /// Convert RedisError to AppError
    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        debug!("GET {}", key);
        let mut conn = self.manager.clone();

        let result: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;

        match result {
            Some(json) => {
                let value = serde_json::from_str::<T>(&json).map_err(|e| {
                    error!("Failed to deserialize value for key {}: {}", key, e);
                    AppError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        debug!("EXISTS {}", key);
        let mut conn = self.manager.clone();

        let exists: bool = conn.exists(key).await.map_err(Self::map_redis_error)?;

        Ok(exists)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, AppError> {
        debug!("SET {} NX EX {}", key, ttl_secs);
        let mut conn = self.manager.clone();

        // OK when the key was created, nil when it already existed
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(result.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError> {
        debug!("DEL {} IF EQUALS", key);
        let mut conn = self.manager.clone();

        let deleted: i32 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(deleted > 0)
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, AppError> {
        debug!("INCR {} (TTL on create: {}s)", key, ttl_secs);
        let mut conn = self.manager.clone();

        let count: i64 = self
            .incr_with_expiry
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(count)
    }
}
