/// Configuration management for feed-service
///
/// Both binaries load the same configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use task_queue::StreamQueueConfig;

use crate::models::NEW_POST_FIELD;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
    /// Port of the fan-out worker's health/metrics server
    pub worker_metrics_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Apply pending migrations at API startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// New-post event stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub stream: String,
    pub group: String,
    /// Consumer name inside the group; must be unique per worker instance
    pub consumer: String,
    pub block_ms: usize,
    pub visibility_timeout_secs: u64,
    /// Deliveries after which a task is dead-lettered
    pub max_deliveries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Cap on stored feed length
    pub max_len: usize,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

fn default_run_migrations() -> bool {
    true
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Settings for the Redis stream backend
    pub fn stream_config(&self) -> StreamQueueConfig {
        StreamQueueConfig {
            stream_key: self.stream.clone(),
            group_name: self.group.clone(),
            consumer_name: self.consumer.clone(),
            payload_field: NEW_POST_FIELD.to_string(),
            block_ms: self.block_ms,
            visibility_timeout: self.visibility_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_or("PORT", 8080),
            worker_metrics_port: env_or("WORKER_METRICS_PORT", 9090),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: env_or("DB_MIN_CONNECTIONS", default_min_connections()),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", default_acquire_timeout_secs()),
            run_migrations: env_or("RUN_MIGRATIONS", default_run_migrations()),
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").context("REDIS_URL environment variable not set")?,
        };

        let queue = QueueConfig {
            stream: std::env::var("FEED_QUEUE_STREAM")
                .unwrap_or_else(|_| "feed:new_post".to_string()),
            group: std::env::var("FEED_QUEUE_GROUP")
                .unwrap_or_else(|_| "fanout-workers".to_string()),
            consumer: std::env::var("FEED_QUEUE_CONSUMER")
                .unwrap_or_else(|_| format!("worker-{}", uuid::Uuid::new_v4())),
            block_ms: env_or("FEED_QUEUE_BLOCK_MS", 5_000),
            visibility_timeout_secs: env_or("FEED_QUEUE_VISIBILITY_TIMEOUT_SECS", 60),
            max_deliveries: env_or("FEED_QUEUE_MAX_DELIVERIES", 10),
        };

        let feed = FeedConfig {
            max_len: env_or("FEED_MAX_LEN", crate::services::MAX_FEED_LEN),
        };

        if !(1..=crate::services::MAX_FEED_LEN).contains(&feed.max_len) {
            anyhow::bail!(
                "FEED_MAX_LEN must be between 1 and {}, got {}",
                crate::services::MAX_FEED_LEN,
                feed.max_len
            );
        }

        Ok(Config {
            app,
            database,
            redis,
            queue,
            feed,
        })
    }
}
