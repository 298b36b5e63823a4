// src/dispatch/queue.rs
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::warn;

/// Bounded hand-off between the frame loop and one dispatch worker.
/// Overflow drops the oldest pending item, so a stalled channel can never
/// block the producer or grow without bound. Single consumer.
pub struct DispatchQueue<T> {
    name: &'static str,
    inner: Mutex<QueueState<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> DispatchQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            inner: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues an item, dropping the oldest pending one when full. Never
    /// blocks. Pushing to a closed queue discards the item.
    pub fn push(&self, item: T) {
        {
            let mut state = self.inner.lock().unwrap();
            if state.closed {
                return;
            }
            if state.items.len() >= self.capacity {
                state.items.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "{} queue full ({} pending), dropping oldest",
                    self.name, self.capacity
                );
            }
            state.items.push_back(item);
        }
        self.notify.notify_one();
    }

    /// Next item, waiting if necessary. `None` once the queue is closed and
    /// fully drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // register interest before checking, so a push or close landing
            // between the check and the await cannot be missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.inner.lock().unwrap();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stops intake. The worker still drains whatever is pending.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_overflow_drops_oldest_keeps_newest() {
        let queue = DispatchQueue::new("test", 2);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, Some(3));
    }

    #[tokio::test]
    async fn test_close_drains_pending_then_ends() {
        let queue = DispatchQueue::new("test", 4);
        queue.push("a");
        queue.push("b");
        queue.close();

        assert_eq!(queue.pop().await, Some("a"));
        assert_eq!(queue.pop().await, Some("b"));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_push_after_close_is_discarded() {
        let queue = DispatchQueue::new("test", 4);
        queue.close();
        queue.push(42);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_waiting_pop_wakes_on_push() {
        let queue = Arc::new(DispatchQueue::new("test", 4));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(7);

        let item = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item, Some(7));
    }

    #[tokio::test]
    async fn test_waiting_pop_wakes_on_close() {
        let queue = Arc::new(DispatchQueue::<u32>::new("test", 4));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let item = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item, None);
    }
}
