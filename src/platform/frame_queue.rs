//! Bounded frame queue that drops the oldest entry when full.

use crate::errors::CameraError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub struct FrameQueue<T> {
    inner: Mutex<QueueInner<T>>,
    cv: Condvar,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.clamp(1, 1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_drop_oldest(&self, item: T) {
        let mut g = self.lock();
        if g.closed {
            return;
        }

        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(item);
        self.cv.notify_one();
    }

    /// Wait up to `timeout` for an item. A zero timeout polls.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, CameraError> {
        let mut g = self.lock();

        if timeout == Duration::ZERO {
            return Ok(g.items.pop_front());
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_front() {
                return Ok(Some(item));
            }
            if g.closed {
                return Err(CameraError::InvalidState("Frame queue closed".to_string()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            g = ng;
        }
    }

    /// Drain everything and return only the newest item
    pub fn take_latest(&self) -> Option<T> {
        let mut g = self.lock();
        let latest = g.items.pop_back();
        g.items.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        self.cv.notify_all();
    }

    /// Clear contents and accept pushes again
    pub fn reset(&self) {
        let mut g = self.lock();
        g.items.clear();
        g.closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_drops_oldest_when_full() {
        let q = FrameQueue::new(2);
        q.push_drop_oldest(1);
        q.push_drop_oldest(2);
        q.push_drop_oldest(3);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.pop_timeout(Duration::ZERO).unwrap(), Some(2));
        assert_eq!(q.pop_timeout(Duration::ZERO).unwrap(), Some(3));
        assert_eq!(q.pop_timeout(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_take_latest_empties_queue() {
        let q = FrameQueue::new(4);
        for i in 0..3 {
            q.push_drop_oldest(i);
        }
        assert_eq!(q.take_latest(), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn test_closed_queue_rejects_pushes_and_wakes_waiters() {
        let q = Arc::new(FrameQueue::<u32>::new(1));
        let waiter = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.pop_timeout(Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(waiter.join().unwrap().is_err());

        q.push_drop_oldest(7);
        assert!(q.is_empty());

        q.reset();
        q.push_drop_oldest(7);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_pop_times_out() {
        let q = FrameQueue::<u8>::new(1);
        assert_eq!(q.pop_timeout(Duration::from_millis(5)).unwrap(), None);
    }
}
