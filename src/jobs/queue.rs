use super::job::Job;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::{Mutex, Notify};

/// Misuse of the queue by the producer. Both variants are programming errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Closed,
    AlreadyClosed,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Closed => write!(f, "cannot enqueue into a closed job queue"),
            QueueError::AlreadyClosed => write!(f, "job queue was closed more than once"),
        }
    }
}

impl std::error::Error for QueueError {}

struct QueueState {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Bounded FIFO shared by a single producer and many workers.
///
/// At most `capacity` jobs are buffered: `enqueue` waits while the buffer is full and `dequeue`
/// waits while it is empty and still open. Once the producer calls [`JobQueue::close`], the
/// remaining jobs are still handed out in order and `dequeue` returns `None` after the last one.
///
/// `dequeue` is cancel-safe: a job is only removed in the same poll that returns it, so racing it
/// against a cancellation token never loses work.
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl JobQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        loop {
            let notified = self.notify.notified();
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.jobs.len() < self.capacity {
                state.jobs.push_back(job);
                drop(state);
                self.notify.notify_waiters();
                return Ok(());
            }
            drop(state);
            notified.await;
        }
    }

    /// Returns the oldest job, or `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            let mut state = self.state.lock().await;
            if let Some(job) = state.jobs.pop_front() {
                drop(state);
                self.notify.notify_waiters();
                return Some(job);
            }
            if state.closed {
                return None;
            }
            drop(state);
            notified.await;
        }
    }

    pub async fn close(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::AlreadyClosed);
        }
        state.closed = true;
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.jobs.is_empty()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
