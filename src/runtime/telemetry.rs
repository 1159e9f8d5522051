use crate::jobs::queue::JobQueue;
use crate::pipeline::PipelineStage;
use crate::pool::worker::WorkerExit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Run counters updated by workers.
#[derive(Default, Debug)]
pub struct Telemetry {
    jobs_attempted: AtomicU64,
    jobs_completed: AtomicU64,
    fetch_failures: AtomicU64,
    parse_failures: AtomicU64,
    store_failures: AtomicU64,
    workers_drained: AtomicU64,
    workers_cancelled: AtomicU64,
}

impl Telemetry {
    pub fn record_job_attempted(&self) {
        self.jobs_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failure(&self, stage: PipelineStage) {
        let counter = match stage {
            PipelineStage::Fetch => &self.fetch_failures,
            PipelineStage::Parse => &self.parse_failures,
            PipelineStage::Store => &self.store_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_exit(&self, exit: WorkerExit) {
        let counter = match exit {
            WorkerExit::Drained => &self.workers_drained,
            WorkerExit::Cancelled => &self.workers_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            jobs_attempted: self.jobs_attempted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            workers_drained: self.workers_drained.load(Ordering::Relaxed),
            workers_cancelled: self.workers_cancelled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub jobs_attempted: u64,
    pub jobs_completed: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,
    pub store_failures: u64,
    pub workers_drained: u64,
    pub workers_cancelled: u64,
}

impl TelemetrySnapshot {
    pub fn jobs_failed(&self) -> u64 {
        self.fetch_failures
            .saturating_add(self.parse_failures)
            .saturating_add(self.store_failures)
    }
}

/// Spawns a background task that periodically logs throughput, queue depth, and failures.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    queue: Arc<JobQueue>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "fetchpool::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current_snapshot = telemetry.snapshot();
                    let completed_delta = current_snapshot
                        .jobs_completed
                        .saturating_sub(last_snapshot.jobs_completed);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        completed_delta as f64 / elapsed
                    };
                    let queued_jobs = queue.len().await;

                    tracing::info!(
                        target: "fetchpool::metrics",
                        throughput = format!("{throughput:.2}"),
                        attempted = current_snapshot.jobs_attempted,
                        completed = current_snapshot.jobs_completed,
                        failed = current_snapshot.jobs_failed(),
                        queued_jobs,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current_snapshot;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
