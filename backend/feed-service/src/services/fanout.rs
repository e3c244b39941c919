//! Fan-out-on-write worker.
//!
//! Drains new-post events from the task queue and prepends each post to the
//! materialized feed of every follower of its author. Delivery is
//! at-least-once: a task is acked only after every follower's feed has been
//! updated, and an un-acked task comes back after the queue's visibility
//! timeout. Feed updates are idempotent, so reprocessing a task that failed
//! half-way through leaves each feed with exactly one copy of the post.

use std::sync::Arc;
use std::time::{Duration, Instant};

use task_queue::{Task, TaskQueue};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::metrics;
use crate::models::NewPostEvent;
use crate::repository::{FeedStore, PostStore, SubscriptionStore};
use crate::services::feed_update::MAX_FEED_LEN;

/// Fan-out worker configuration
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Cap on each follower's stored feed
    pub max_feed_len: usize,
    /// Tasks delivered more often than this are dead-lettered
    pub max_deliveries: u32,
    /// Pause after a failed `take` before polling again
    pub queue_error_backoff: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_feed_len: MAX_FEED_LEN,
            max_deliveries: 10,
            queue_error_backoff: Duration::from_secs(1),
        }
    }
}

/// How a task left the worker. Every variant means the task was acked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Post prepended to `inserted` of `followers` feeds; the rest already had it
    Delivered { followers: usize, inserted: usize },
    /// Post never existed or was removed
    PostNotFound,
    /// Author has no followers
    NoFollowers,
    /// Task moved to the dead-letter stream without processing
    DeadLettered { reason: String },
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Delivered { .. } => "delivered",
            TaskOutcome::PostNotFound => "post_not_found",
            TaskOutcome::NoFollowers => "no_followers",
            TaskOutcome::DeadLettered { .. } => "dead_lettered",
        }
    }
}

pub struct FanoutWorker {
    queue: Arc<dyn TaskQueue>,
    posts: Arc<dyn PostStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    feeds: Arc<dyn FeedStore>,
    config: FanoutConfig,
}

impl FanoutWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        posts: Arc<dyn PostStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        feeds: Arc<dyn FeedStore>,
        config: FanoutConfig,
    ) -> Self {
        Self {
            queue,
            posts,
            subscriptions,
            feeds,
            config,
        }
    }

    /// Process tasks until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Queue and processing errors are logged and counted; they never stop
    /// the loop. A task in progress is always finished before shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            max_feed_len = self.config.max_feed_len,
            max_deliveries = self.config.max_deliveries,
            "Fan-out worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let taken = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                taken = self.queue.take() => taken,
            };

            match taken {
                Ok(Some(task)) => {
                    // Already logged and counted; the queue redelivers on failure
                    let _ = self.handle(task).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, transient = e.is_transient(), "Failed to take task from queue");
                    metrics::record_queue_error();

                    tokio::select! {
                        biased;
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.config.queue_error_backoff) => {}
                    }
                }
            }
        }

        info!("Fan-out worker stopped");
    }

    /// Take at most one task and process it.
    ///
    /// Returns `Ok(None)` when the queue had nothing within its poll timeout.
    pub async fn run_once(&self) -> Result<Option<TaskOutcome>> {
        match self.queue.take().await? {
            Some(task) => self.handle(task).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process a task, recording metrics and logging the result.
    async fn handle(&self, task: Task) -> Result<TaskOutcome> {
        let started = Instant::now();
        let result = self.process_task(&task).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(outcome) => {
                metrics::record_task(outcome.label(), elapsed);
                debug!(
                    task_id = %task.id,
                    outcome = outcome.label(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Task processed"
                );
            }
            Err(e) => {
                metrics::record_task("failed", elapsed);
                error!(
                    task_id = %task.id,
                    payload = %task.payload,
                    delivery_count = task.delivery_count,
                    transient = e.is_transient(),
                    error = %e,
                    "Fan-out failed; task left un-acked for redelivery"
                );
            }
        }

        result
    }

    /// Fan one task out to the author's followers, then ack it.
    ///
    /// On error the task is left un-acked.
    pub async fn process_task(&self, task: &Task) -> Result<TaskOutcome> {
        if task.delivery_count > self.config.max_deliveries {
            let reason = format!(
                "delivered {} times (limit {})",
                task.delivery_count, self.config.max_deliveries
            );
            return self.dead_letter(task, reason).await;
        }

        let event = match task.payload.parse::<NewPostEvent>() {
            Ok(event) => event,
            Err(e) => return self.dead_letter(task, e.to_string()).await,
        };

        if task.is_redelivery() {
            info!(
                task_id = %task.id,
                post_id = %event.post_id,
                delivery_count = task.delivery_count,
                "Reprocessing redelivered task"
            );
        }

        let Some(post) = self.posts.get_post(event.post_id).await? else {
            debug!(post_id = %event.post_id, "Post missing or removed, nothing to fan out");
            self.queue.ack(&task.id).await?;
            return Ok(TaskOutcome::PostNotFound);
        };

        let followers = self.subscriptions.get_followers(post.creator()).await?;
        if followers.is_empty() {
            debug!(post_id = %event.post_id, author = %post.creator(), "Author has no followers");
            self.queue.ack(&task.id).await?;
            return Ok(TaskOutcome::NoFollowers);
        }

        let mut inserted = 0;
        for follower in &followers {
            let change = self
                .feeds
                .add_post(*follower, event.post_id, self.config.max_feed_len)
                .await?;
            metrics::record_feed_update(change.as_str());
            if change.is_changed() {
                inserted += 1;
            }
        }

        self.queue.ack(&task.id).await?;

        info!(
            post_id = %event.post_id,
            author = %post.creator(),
            followers = followers.len(),
            inserted,
            "Post fanned out"
        );
        Ok(TaskOutcome::Delivered {
            followers: followers.len(),
            inserted,
        })
    }

    async fn dead_letter(&self, task: &Task, reason: String) -> Result<TaskOutcome> {
        warn!(
            task_id = %task.id,
            payload = %task.payload,
            reason = %reason,
            "Dead-lettering task"
        );
        self.queue.bury(task, &reason).await?;
        Ok(TaskOutcome::DeadLettered { reason })
    }
}
