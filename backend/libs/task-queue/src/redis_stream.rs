//! Redis Streams backend.
//!
//! One stream, one consumer group. Every worker instance is a consumer in the
//! group with a unique name.
//!
//! - `put`  → `XADD <stream> * <field> <payload>`
//! - `take` → reclaim one entry idle for longer than the visibility timeout
//!   (`XPENDING ... IDLE` + `XCLAIM`), otherwise `XREADGROUP ... BLOCK`
//! - `ack`  → `XACK` + `XDEL` (the group is the stream's only reader)
//! - `bury` → `XADD <stream>:dead ...` + `XACK` + `XDEL`

use crate::{QueueResult, Task, TaskId, TaskQueue};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimReply, StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for a Redis Streams queue
#[derive(Debug, Clone)]
pub struct StreamQueueConfig {
    /// Stream key holding the tasks
    pub stream_key: String,
    /// Consumer group shared by all workers
    pub group_name: String,
    /// Consumer name (unique per worker instance)
    pub consumer_name: String,
    /// Entry field carrying the payload
    pub payload_field: String,
    /// How long `XREADGROUP` blocks before `take` returns `None`
    pub block_ms: usize,
    /// Un-acked entries idle for longer than this are redelivered
    pub visibility_timeout: Duration,
}

impl Default for StreamQueueConfig {
    fn default() -> Self {
        Self {
            stream_key: "tasks".to_string(),
            group_name: "workers".to_string(),
            consumer_name: format!("consumer-{}", Uuid::new_v4()),
            payload_field: "payload".to_string(),
            block_ms: 5_000,
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

impl StreamQueueConfig {
    /// Dead-letter stream key (`<stream>:dead`)
    pub fn dead_letter_key(&self) -> String {
        format!("{}:dead", self.stream_key)
    }
}

/// Redis Streams consumer-group queue
pub struct RedisStreamQueue {
    /// Used for the blocking `XREADGROUP` only
    reader: ConnectionManager,
    writer: ConnectionManager,
    config: StreamQueueConfig,
}

impl RedisStreamQueue {
    /// Connect and make sure the consumer group exists.
    pub async fn connect(redis_url: &str, config: StreamQueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let reader = ConnectionManager::new(client.clone()).await?;
        let writer = ConnectionManager::new(client).await?;

        let queue = Self {
            reader,
            writer,
            config,
        };
        queue.ensure_group().await?;

        info!(
            stream = %queue.config.stream_key,
            group = %queue.config.group_name,
            consumer = %queue.config.consumer_name,
            "Redis stream queue ready"
        );
        Ok(queue)
    }

    pub fn config(&self) -> &StreamQueueConfig {
        &self.config
    }

    /// Create the consumer group (idempotent)
    async fn ensure_group(&self) -> QueueResult<()> {
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_key)
            .arg(&self.config.group_name)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut self.writer.clone())
            .await;

        match result {
            Ok(()) => {
                info!(group = %self.config.group_name, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(group = %self.config.group_name, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Take over one entry that another (or this) consumer received but never
    /// acked within the visibility timeout.
    async fn claim_stale(&self) -> QueueResult<Option<Task>> {
        let idle_ms = self.config.visibility_timeout.as_millis() as u64;
        let mut conn = self.writer.clone();

        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&self.config.stream_key)
            .arg(&self.config.group_name)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        let Some((entry_id, previous_owner, idle, deliveries)) = pending.into_iter().next() else {
            return Ok(None);
        };

        let claimed: StreamClaimReply = conn
            .xclaim(
                &self.config.stream_key,
                &self.config.group_name,
                &self.config.consumer_name,
                idle_ms,
                &[&entry_id],
            )
            .await?;

        match claimed.ids.into_iter().next() {
            Some(entry) => {
                info!(
                    task_id = %entry_id,
                    previous_owner = %previous_owner,
                    idle_ms = idle,
                    deliveries = deliveries + 1,
                    "Reclaimed stale task for redelivery"
                );
                Ok(Some(entry_to_task(
                    entry,
                    &self.config.payload_field,
                    deliveries as u32 + 1,
                )))
            }
            None => {
                debug!(task_id = %entry_id, "Stale task claimed by another consumer");
                Ok(None)
            }
        }
    }
}

/// Convert a stream entry to a task.
///
/// An entry without the payload field becomes a task with an empty payload so
/// the consumer can dead-letter it instead of retrying it forever.
pub(crate) fn entry_to_task(entry: StreamId, payload_field: &str, delivery_count: u32) -> Task {
    let payload = match entry.get::<String>(payload_field) {
        Some(p) => p,
        None => {
            warn!(
                task_id = %entry.id,
                field = %payload_field,
                "Stream entry has no payload field"
            );
            String::new()
        }
    };

    Task {
        id: TaskId(entry.id),
        payload,
        delivery_count,
    }
}

#[async_trait]
impl TaskQueue for RedisStreamQueue {
    async fn put(&self, payload: &str) -> QueueResult<TaskId> {
        let id: String = self
            .writer
            .clone()
            .xadd(
                &self.config.stream_key,
                "*",
                &[(self.config.payload_field.as_str(), payload)],
            )
            .await?;

        debug!(task_id = %id, stream = %self.config.stream_key, "Task enqueued");
        Ok(TaskId(id))
    }

    async fn take(&self) -> QueueResult<Option<Task>> {
        if let Some(task) = self.claim_stale().await? {
            return Ok(Some(task));
        }

        let opts = StreamReadOptions::default()
            .group(&self.config.group_name, &self.config.consumer_name)
            .block(self.config.block_ms)
            .count(1);

        let reply: Option<StreamReadReply> = self
            .reader
            .clone()
            .xread_options(&[&self.config.stream_key], &[">"], &opts)
            .await?;

        let entry = reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|k| k.ids.into_iter().next());

        Ok(entry.map(|e| entry_to_task(e, &self.config.payload_field, 1)))
    }

    async fn ack(&self, task_id: &TaskId) -> QueueResult<()> {
        redis::pipe()
            .atomic()
            .xack(
                &self.config.stream_key,
                &self.config.group_name,
                &[task_id.as_str()],
            )
            .ignore()
            .xdel(&self.config.stream_key, &[task_id.as_str()])
            .ignore()
            .query_async::<_, ()>(&mut self.writer.clone())
            .await?;

        debug!(task_id = %task_id, "Task acknowledged");
        Ok(())
    }

    async fn bury(&self, task: &Task, reason: &str) -> QueueResult<()> {
        let dead_key = self.config.dead_letter_key();
        let deliveries = task.delivery_count.to_string();

        redis::pipe()
            .atomic()
            .xadd(
                &dead_key,
                "*",
                &[
                    ("task_id", task.id.as_str()),
                    ("payload", task.payload.as_str()),
                    ("reason", reason),
                    ("deliveries", deliveries.as_str()),
                ],
            )
            .ignore()
            .xack(
                &self.config.stream_key,
                &self.config.group_name,
                &[task.id.as_str()],
            )
            .ignore()
            .xdel(&self.config.stream_key, &[task.id.as_str()])
            .ignore()
            .query_async::<_, ()>(&mut self.writer.clone())
            .await?;

        warn!(
            task_id = %task.id,
            dead_letter_stream = %dead_key,
            reason = %reason,
            deliveries = task.delivery_count,
            "Task moved to dead-letter stream"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), redis::Value::Data(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = StreamQueueConfig::default();
        assert_eq!(config.stream_key, "tasks");
        assert_eq!(config.group_name, "workers");
        assert_eq!(config.payload_field, "payload");
        assert_eq!(config.block_ms, 5_000);
        assert_eq!(config.visibility_timeout, Duration::from_secs(60));
        assert!(config.consumer_name.starts_with("consumer-"));
    }

    #[test]
    fn test_consumer_names_are_unique() {
        let a = StreamQueueConfig::default();
        let b = StreamQueueConfig::default();
        assert_ne!(a.consumer_name, b.consumer_name);
    }

    #[test]
    fn test_dead_letter_key() {
        let config = StreamQueueConfig {
            stream_key: "feed:new_post".to_string(),
            ..StreamQueueConfig::default()
        };
        assert_eq!(config.dead_letter_key(), "feed:new_post:dead");
    }

    #[test]
    fn test_entry_to_task_reads_payload_field() {
        let task = entry_to_task(entry("1700000000000-0", &[("post_id", "100")]), "post_id", 1);
        assert_eq!(task.id, TaskId::from("1700000000000-0"));
        assert_eq!(task.payload, "100");
        assert_eq!(task.delivery_count, 1);
    }

    #[test]
    fn test_entry_without_payload_field_yields_empty_payload() {
        let task = entry_to_task(entry("1-0", &[("other", "x")]), "post_id", 3);
        assert_eq!(task.payload, "");
        assert_eq!(task.delivery_count, 3);
    }
}
