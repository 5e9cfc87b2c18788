//! FIFO queue for pending work.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A FIFO of work items awaiting dispatch.
///
/// Cloneable handle over a shared deque; HTTP handlers enqueue while a
/// single loop dequeues. Strictly first-in-first-out per producer; the
/// interleaving between concurrent producers is unspecified.
pub struct PendingQueue<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Append an item at the back.
    pub fn enqueue(&self, item: T) {
        self.inner.lock().expect("queue lock poisoned").push_back(item);
    }

    /// Remove and return the front item, `None` when empty.
    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock().expect("queue lock poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for PendingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
