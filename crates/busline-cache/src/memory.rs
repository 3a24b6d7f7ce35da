//! In-process implementation of `CacheService`
//!
//! Mirrors the Redis semantics the engine relies on (set-if-absent, owner
//! checked delete, increment with TTL on create) inside a single mutex, so
//! every operation is atomic with respect to the others. Expiry is measured
//! on the tokio clock, which lets tests pause and advance time.

use async_trait::async_trait;
use busline_core::error::AppError;
use busline_core::traits::CacheService;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Memory-backed store
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of `key`, `None` if absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn live_value(entries: &mut HashMap<String, Entry>, key: &str) -> Option<String> {
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        debug!("GET {}", key);
        let raw = Self::live_value(&mut self.entries.lock(), key);

        match raw {
            Some(json) => {
                let value = serde_json::from_str::<T>(&json).map_err(|e| {
                    error!("Failed to deserialize value for key {}: {}", key, e);
                    AppError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(Self::live_value(&mut self.entries.lock(), key).is_some())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, AppError> {
        debug!("SET {} NX EX {}", key, ttl_secs);
        let mut entries = self.entries.lock();
        if Self::live_value(&mut entries, key).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError> {
        debug!("DEL {} IF EQUALS", key);
        let mut entries = self.entries.lock();
        match Self::live_value(&mut entries, key) {
            Some(current) if current == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, AppError> {
        debug!("INCR {} (TTL on create: {}s)", key, ttl_secs);
        let mut entries = self.entries.lock();

        let next = match Self::live_value(&mut entries, key) {
            Some(current) => {
                let count: i64 = current.parse().map_err(|_| {
                    AppError::Cache(format!("Value at {} is not an integer", key))
                })?;
                count + 1
            }
            None => 1,
        };

        let expires_at = if next == 1 {
            Some(Instant::now() + Duration::from_secs(ttl_secs))
        } else {
            entries.get(key).and_then(|e| e.expires_at)
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}
