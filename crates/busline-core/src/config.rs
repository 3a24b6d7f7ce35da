//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/busline".to_string(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in minutes
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,
}

fn default_jwt_expiration() -> i64 {
    1440 // 24 hours
}

/// Reservation engine tuning
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BookingConfig {
    /// Successful reservations allowed per user per calendar day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Seat lock time-to-live; must exceed the reservation transaction time
    #[serde(default = "default_seat_lock_ttl")]
    pub seat_lock_ttl_secs: u64,

    /// Daily counter time-to-live from first increment
    #[serde(default = "default_daily_counter_ttl")]
    pub daily_counter_ttl_secs: u64,

    /// Pending refund jobs buffered before `cancel` applies backpressure
    #[serde(default = "default_refund_queue_capacity")]
    pub refund_queue_capacity: usize,

    /// Delivery attempts per refund job before it is reported as failed
    #[serde(default = "default_refund_max_attempts")]
    pub refund_max_attempts: u32,

    /// First retry delay; doubled on each further attempt
    #[serde(default = "default_refund_retry_base")]
    pub refund_retry_base_ms: u64,
}

fn default_daily_limit() -> u32 {
    20
}

fn default_seat_lock_ttl() -> u64 {
    10
}

fn default_daily_counter_ttl() -> u64 {
    86400
}

fn default_refund_queue_capacity() -> usize {
    1024
}

fn default_refund_max_attempts() -> u32 {
    5
}

fn default_refund_retry_base() -> u64 {
    200
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            seat_lock_ttl_secs: default_seat_lock_ttl(),
            daily_counter_ttl_secs: default_daily_counter_ttl(),
            refund_queue_capacity: default_refund_queue_capacity(),
            refund_max_attempts: default_refund_max_attempts(),
            refund_retry_base_ms: default_refund_retry_base(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("auth.jwt_expiration_minutes", 1440)?
            .set_default("booking.daily_limit", 20)?
            .set_default("booking.seat_lock_ttl_secs", 10)?
            .set_default("booking.daily_counter_ttl_secs", 86400)?
            .set_default("booking.refund_queue_capacity", 1024)?
            .set_default("booking.refund_max_attempts", 5)?
            .set_default("booking.refund_retry_base_ms", 200)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with BUSLINE_ prefix
            .add_source(
                Environment::with_prefix("BUSLINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("BUSLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
