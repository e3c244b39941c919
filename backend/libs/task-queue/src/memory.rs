//! In-process queue with the same at-least-once contract as the Redis backend.

use crate::{QueueResult, Task, TaskId, TaskQueue};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Acked ids and dead letters kept for inspection, newest last
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// A task moved aside by `bury`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub task_id: TaskId,
    pub payload: String,
    pub reason: String,
    pub deliveries: u32,
}

struct Entry {
    seq: u64,
    id: TaskId,
    payload: String,
    deliveries: u32,
}

struct InFlight {
    entry: Entry,
    deadline: Instant,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    ready: VecDeque<Entry>,
    in_flight: HashMap<TaskId, InFlight>,
    acked: VecDeque<TaskId>,
    dead: VecDeque<DeadLetter>,
}

fn push_bounded<T>(history: &mut VecDeque<T>, item: T, limit: usize) {
    if limit == 0 {
        return;
    }
    if history.len() == limit {
        history.pop_front();
    }
    history.push_back(item);
}

impl State {
    /// Move every delivery whose visibility timeout has passed back to the
    /// head of the ready queue, oldest first.
    fn requeue_expired(&mut self, now: Instant) {
        let mut expired: Vec<TaskId> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }

        let mut entries: Vec<Entry> = expired
            .drain(..)
            .filter_map(|id| self.in_flight.remove(&id))
            .map(|f| f.entry)
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.seq));
        for entry in entries {
            self.ready.push_front(entry);
        }
    }
}

/// Single-process at-least-once queue.
///
/// Un-acked deliveries become visible again after `visibility_timeout`.
/// Only the most recent acked ids and dead letters are retained, up to the
/// history limit.
pub struct InMemoryTaskQueue {
    state: Mutex<State>,
    notify: Notify,
    visibility_timeout: Duration,
    poll_timeout: Duration,
    history_limit: usize,
}

impl InMemoryTaskQueue {
    pub fn new(visibility_timeout: Duration, poll_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            visibility_timeout,
            poll_timeout,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Tasks that are waiting or delivered but not yet acked
    pub async fn pending_len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    /// Tasks currently handed out to a consumer
    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn acked_ids(&self) -> Vec<TaskId> {
        self.state.lock().await.acked.iter().cloned().collect()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.iter().cloned().collect()
    }

    /// Remove and return the retained dead letters
    pub async fn drain_dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.drain(..).collect()
    }

    async fn try_take(&self) -> Option<Task> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.requeue_expired(now);

        let mut entry = state.ready.pop_front()?;
        entry.deliveries += 1;
        let task = Task {
            id: entry.id.clone(),
            payload: entry.payload.clone(),
            delivery_count: entry.deliveries,
        };
        state.in_flight.insert(
            entry.id.clone(),
            InFlight {
                entry,
                deadline: now + self.visibility_timeout,
            },
        );
        Some(task)
    }

    /// Drop a task from wherever it currently is. Returns the entry if found.
    fn remove(state: &mut State, task_id: &TaskId) -> Option<Entry> {
        if let Some(flight) = state.in_flight.remove(task_id) {
            return Some(flight.entry);
        }
        let pos = state.ready.iter().position(|e| &e.id == task_id)?;
        state.ready.remove(pos)
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_millis(100))
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn put(&self, payload: &str) -> QueueResult<TaskId> {
        let id = {
            let mut state = self.state.lock().await;
            state.next_seq += 1;
            let seq = state.next_seq;
            let id = TaskId(seq.to_string());
            state.ready.push_back(Entry {
                seq,
                id: id.clone(),
                payload: payload.to_string(),
                deliveries: 0,
            });
            id
        };
        self.notify.notify_one();
        Ok(id)
    }

    async fn take(&self) -> QueueResult<Option<Task>> {
        if let Some(task) = self.try_take().await {
            return Ok(Some(task));
        }
        let _ = tokio::time::timeout(self.poll_timeout, self.notify.notified()).await;
        Ok(self.try_take().await)
    }

    async fn ack(&self, task_id: &TaskId) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if Self::remove(&mut state, task_id).is_some() {
            push_bounded(&mut state.acked, task_id.clone(), self.history_limit);
        } else {
            debug!(task_id = %task_id, "Ack for task that is no longer pending");
        }
        Ok(())
    }

    async fn bury(&self, task: &Task, reason: &str) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        Self::remove(&mut state, &task.id);
        let dead = DeadLetter {
            task_id: task.id.clone(),
            payload: task.payload.clone(),
            reason: reason.to_string(),
            deliveries: task.delivery_count,
        };
        push_bounded(&mut state.dead, dead, self.history_limit);
        push_bounded(&mut state.acked, task.id.clone(), self.history_limit);
        Ok(())
    }
}
