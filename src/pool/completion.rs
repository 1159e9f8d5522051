use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Counts launched workers that have not exited yet.
///
/// Each launch takes a [`CompletionGuard`]; dropping it marks that worker done, so every exit
/// path (return, panic, task abort) is counted exactly once.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> CompletionGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        CompletionGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once every guard handed out so far has been dropped.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

pub struct CompletionGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
