//! At-least-once delivery contract exercised through `dyn TaskQueue`.

use std::sync::Arc;
use std::time::Duration;
use task_queue::{InMemoryTaskQueue, TaskQueue};

fn shared_queue(visibility: Duration) -> (Arc<InMemoryTaskQueue>, Arc<dyn TaskQueue>) {
    let queue = Arc::new(InMemoryTaskQueue::new(visibility, Duration::from_millis(10)));
    let dyn_queue: Arc<dyn TaskQueue> = queue.clone();
    (queue, dyn_queue)
}

#[tokio::test]
async fn crashed_consumer_task_goes_to_next_consumer() {
    let (inspect, queue) = shared_queue(Duration::ZERO);
    queue.put("100").await.unwrap();

    // Consumer A takes the task and "crashes" without acking
    let first = queue.take().await.unwrap().expect("task delivered");
    assert_eq!(first.delivery_count, 1);

    // Consumer B sees the same task again
    let second = queue.take().await.unwrap().expect("task redelivered");
    assert_eq!(second.id, first.id);
    assert_eq!(second.payload, "100");
    assert_eq!(second.delivery_count, 2);

    queue.ack(&second.id).await.unwrap();
    assert_eq!(inspect.pending_len().await, 0);

    // Late ack from consumer A is harmless
    queue.ack(&first.id).await.unwrap();
    assert!(queue.take().await.unwrap().is_none());
}

#[tokio::test]
async fn acked_tasks_are_never_redelivered() {
    let (_inspect, queue) = shared_queue(Duration::ZERO);
    for payload in ["1", "2", "3"] {
        queue.put(payload).await.unwrap();
    }

    let mut seen = Vec::new();
    while let Some(task) = queue.take().await.unwrap() {
        seen.push(task.payload.clone());
        queue.ack(&task.id).await.unwrap();
    }

    assert_eq!(seen, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn buried_tasks_leave_the_queue() {
    let (inspect, queue) = shared_queue(Duration::ZERO);
    queue.put("not-a-number").await.unwrap();

    let task = queue.take().await.unwrap().unwrap();
    queue.bury(&task, "malformed payload").await.unwrap();

    assert!(queue.take().await.unwrap().is_none());
    let dead = inspect.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].task_id, task.id);
}
