use crate::jobs::job::{jobs_from_urls, Job};
use crate::jobs::queue::{JobQueue, QueueError};
use crate::pipeline::Pipeline;
use crate::pool::supervisor::{WorkerPool, WorkerPoolParams};
use crate::runtime::config::PoolConfig;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::shutdown::{termination_signal, ShutdownCoordinator};
use crate::runtime::telemetry::{spawn_metrics_reporter, Telemetry, TelemetrySnapshot};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one run, derived from the worker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs_total: usize,
    pub jobs_enqueued: usize,
    pub telemetry: TelemetrySnapshot,
}

impl RunSummary {
    pub fn jobs_completed(&self) -> u64 {
        self.telemetry.jobs_completed
    }

    pub fn jobs_failed(&self) -> u64 {
        self.telemetry.jobs_failed()
    }
}

/// Wires queue, worker pool, producer, and metrics reporter for one list of locators.
pub struct Runner {
    config: PoolConfig,
    pipeline: Pipeline,
    shutdown: CancellationToken,
}

impl Runner {
    pub fn new(config: PoolConfig, pipeline: Pipeline) -> Self {
        Self::with_cancellation_token(config, pipeline, CancellationToken::new())
    }

    /// Uses `shutdown` as the pool-wide token so callers can plug in their own cancellation.
    pub fn with_cancellation_token(
        config: PoolConfig,
        pipeline: Pipeline,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            pipeline,
            shutdown,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns a clone of the pool-wide token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Processes every locator and returns once all workers have stopped.
    ///
    /// Jobs are numbered `1..=n` in input order. Cancelling the token stops the producer and the
    /// workers after their in-flight jobs; the run still returns a summary. Queue misuse or a
    /// panicking worker aborts the run with an error.
    pub async fn run(&self, urls: Vec<String>) -> Result<RunSummary> {
        let jobs = jobs_from_urls(urls);
        let jobs_total = jobs.len();
        let capacity = self.config.queue_capacity().unwrap_or(jobs_total).max(1);
        tracing::info!(jobs = jobs_total, capacity, "loaded jobs");

        let queue = Arc::new(JobQueue::with_capacity(capacity));
        let telemetry = Arc::new(Telemetry::default());
        let fatal_handler = Arc::new(FatalErrorHandler::new(self.shutdown.clone()));
        let pool = WorkerPool::new(WorkerPoolParams {
            worker_count: self.config.worker_count(),
            shutdown: self.shutdown.clone(),
            queue: queue.clone(),
            pipeline: self.pipeline.clone(),
            telemetry: telemetry.clone(),
            fatal_handler: fatal_handler.clone(),
        });

        let reporter_shutdown = self.shutdown.child_token();
        let reporter = spawn_metrics_reporter(
            telemetry.clone(),
            queue.clone(),
            reporter_shutdown.clone(),
            self.config.metrics_interval(),
        );

        tracing::info!(workers = pool.worker_count(), "starting workers");
        pool.start().context("failed to start worker pool")?;

        let jobs_enqueued = match produce_jobs(&queue, jobs, &self.shutdown).await {
            Ok(enqueued) => enqueued,
            Err(err) => {
                fatal_handler.trigger("job producer", err.into());
                0
            }
        };

        let joined = pool.join().await;
        reporter_shutdown.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "metrics reporter task panicked");
        }
        joined?;

        let summary = RunSummary {
            jobs_total,
            jobs_enqueued,
            telemetry: telemetry.snapshot(),
        };
        tracing::info!(
            total = summary.jobs_total,
            enqueued = summary.jobs_enqueued,
            attempted = summary.telemetry.jobs_attempted,
            completed = summary.jobs_completed(),
            failed = summary.jobs_failed(),
            cancelled = self.shutdown.is_cancelled(),
            "all downloads complete"
        );
        Ok(summary)
    }

    /// Like [`Runner::run`], but Ctrl-C or SIGTERM cancels the pool through a
    /// [`ShutdownCoordinator`].
    pub async fn run_until_ctrl_c(&self, urls: Vec<String>) -> Result<RunSummary> {
        let coordinator = ShutdownCoordinator::new(self.shutdown.clone());
        let listener = coordinator.listen(termination_signal());
        tracing::info!("runner started; waiting for jobs to finish or Ctrl-C to shut down");

        let result = self.run(urls).await;
        listener.abort();
        result
    }
}

/// Enqueues `jobs` in order, then closes the queue. Stops early when `shutdown` fires.
async fn produce_jobs(
    queue: &JobQueue,
    jobs: Vec<Job>,
    shutdown: &CancellationToken,
) -> Result<usize, QueueError> {
    let mut enqueued = 0usize;
    for job in jobs {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!(enqueued, "cancellation requested; job producer stopping early");
                break;
            }
            result = queue.enqueue(job) => {
                result?;
                enqueued += 1;
            }
        }
    }
    queue.close().await?;
    Ok(enqueued)
}
