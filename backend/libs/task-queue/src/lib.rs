//! # Task Queue Library
//!
//! At-least-once work queue used to hand "post created" events from the API
//! to the fan-out workers.
//!
//! ## Delivery contract
//!
//! - `take()` hands a task to exactly one consumer at a time
//! - a task stays pending until the consumer calls `ack()`
//! - a pending task whose consumer went silent for longer than the visibility
//!   timeout is redelivered, with its `delivery_count` incremented
//! - `bury()` moves a task to the dead-letter stream and acks it
//!
//! Consumers must therefore tolerate duplicates: the same payload can be
//! delivered more than once, to the same or to another consumer.
//!
//! ## Backends
//!
//! - [`RedisStreamQueue`]: Redis Streams with one consumer group, used in
//!   production. Redelivery is `XPENDING ... IDLE` + `XCLAIM`.
//! - [`InMemoryTaskQueue`]: single-process queue with the same contract,
//!   used by tests and local development.
//!
//! ```ignore
//! use task_queue::{RedisStreamQueue, StreamQueueConfig, TaskQueue};
//!
//! let queue = RedisStreamQueue::connect("redis://127.0.0.1/", StreamQueueConfig::default()).await?;
//! queue.put("100").await?;
//!
//! if let Some(task) = queue.take().await? {
//!     handle(&task.payload).await?;
//!     queue.ack(&task.id).await?;
//! }
//! ```

use async_trait::async_trait;
use std::fmt;

mod error;
pub mod memory;
pub mod redis_stream;

pub use error::{QueueError, QueueResult};
pub use memory::InMemoryTaskQueue;
pub use redis_stream::{RedisStreamQueue, StreamQueueConfig};

/// Identifier of a queued task (a Redis stream entry id, or a counter for the
/// in-memory backend)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

/// A unit of in-flight queue work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    /// Opaque payload as produced by `put`
    pub payload: String,

    /// How many times this task has been handed out, including this delivery
    pub delivery_count: u32,
}

impl Task {
    /// True when this is not the first delivery of the task
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// At-least-once task queue.
///
/// Implementations must be safe to share between tasks (`Arc<dyn TaskQueue>`).
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a payload, returning the id of the new task.
    async fn put(&self, payload: &str) -> QueueResult<TaskId>;

    /// Wait for the next task.
    ///
    /// Returns `Ok(None)` when nothing became available within the backend's
    /// poll timeout, so callers can check for shutdown between waits.
    async fn take(&self) -> QueueResult<Option<Task>>;

    /// Acknowledge a task so it is never delivered again.
    async fn ack(&self, task_id: &TaskId) -> QueueResult<()>;

    /// Move a task that can never be processed to the dead-letter stream,
    /// then acknowledge it.
    async fn bury(&self, task: &Task, reason: &str) -> QueueResult<()>;
}
