//! Supervisor for a fixed set of workers sharing one job queue.
//!
//! The pool derives one child cancellation token per worker from its own token, keeps the
//! `worker_id → handle` map behind a mutex, and counts live workers with a
//! [`CompletionTracker`] so `join` can wait for the last one to exit.

use super::completion::CompletionTracker;
use super::worker::Worker;
use crate::jobs::queue::JobQueue;
use crate::pipeline::Pipeline;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::Telemetry;
use anyhow::{anyhow, bail, Result};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Cancellation handle for one running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    worker_id: usize,
    token: CancellationToken,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct WorkerPool {
    worker_count: usize,
    shutdown: CancellationToken,
    queue: Arc<JobQueue>,
    pipeline: Pipeline,
    telemetry: Arc<Telemetry>,
    fatal_handler: Arc<FatalErrorHandler>,
    handles: Mutex<HashMap<usize, WorkerHandle>>,
    completion: Arc<CompletionTracker>,
    started: AtomicBool,
}

pub struct WorkerPoolParams {
    pub worker_count: usize,
    pub shutdown: CancellationToken,
    pub queue: Arc<JobQueue>,
    pub pipeline: Pipeline,
    pub telemetry: Arc<Telemetry>,
    pub fatal_handler: Arc<FatalErrorHandler>,
}

impl WorkerPool {
    pub fn new(params: WorkerPoolParams) -> Self {
        Self {
            worker_count: params.worker_count.max(1),
            shutdown: params.shutdown,
            queue: params.queue,
            pipeline: params.pipeline,
            telemetry: params.telemetry,
            fatal_handler: params.fatal_handler,
            handles: Mutex::new(HashMap::new()),
            completion: Arc::new(CompletionTracker::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Pool-wide token every worker token derives from.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns workers `1..=worker_count`. Must run inside a Tokio runtime and only once.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            bail!("worker pool already started");
        }

        for worker_id in 1..=self.worker_count {
            let token = self.shutdown.child_token();
            self.lock_handles().insert(
                worker_id,
                WorkerHandle {
                    worker_id,
                    token: token.clone(),
                },
            );

            let completion = self.completion.enter();
            let worker = Worker::new(
                worker_id,
                self.queue.clone(),
                self.pipeline.clone(),
                token,
                self.telemetry.clone(),
            );
            let fatal_handler = self.fatal_handler.clone();

            tokio::spawn(async move {
                let _completion = completion;
                let result = std::panic::AssertUnwindSafe(worker.run())
                    .catch_unwind()
                    .await;

                if let Err(panic_payload) = result {
                    let panic_msg = panic_message(panic_payload.as_ref());
                    tracing::error!(
                        worker = worker_id,
                        panic = %panic_msg,
                        "worker task panicked"
                    );
                    let context = format!("worker {worker_id} panicked");
                    fatal_handler.trigger(
                        context.as_str(),
                        anyhow!("worker {worker_id} panicked: {panic_msg}"),
                    );
                }
            });
        }

        tracing::info!(workers = self.worker_count, "worker pool started");
        Ok(())
    }

    /// Cancels one worker and forgets its handle.
    ///
    /// Returns `false` when no handle is registered for `worker_id`, including when the worker was
    /// already cancelled through this method.
    pub fn cancel_worker(&self, worker_id: usize) -> bool {
        let mut handles = self.lock_handles();
        match handles.remove(&worker_id) {
            Some(handle) => {
                tracing::info!(worker = worker_id, "cancelling worker");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels the pool token and with it every worker.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    /// Ids of workers that still have a registered handle, in ascending order.
    pub fn registered_workers(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.lock_handles().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Workers that have been launched and not yet exited.
    pub fn running_workers(&self) -> usize {
        self.completion.outstanding()
    }

    /// Waits until every launched worker has exited, then drops all handles.
    ///
    /// There is no internal timeout: a worker stuck inside a step keeps this pending until the
    /// step returns. Fails when a worker panicked or another fatal error was recorded.
    pub async fn join(&self) -> Result<()> {
        self.completion.wait().await;
        self.lock_handles().clear();
        tracing::info!(workers = self.worker_count, "all workers stopped");

        match self.fatal_handler.error() {
            Some(err) => Err(err.context("worker pool aborted")),
            None => Ok(()),
        }
    }

    fn lock_handles(&self) -> MutexGuard<'_, HashMap<usize, WorkerHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
