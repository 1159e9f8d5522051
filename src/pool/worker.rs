use crate::jobs::job::Job;
use crate::jobs::queue::JobQueue;
use crate::pipeline::Pipeline;
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue was closed and empty.
    Drained,
    /// The worker's token (or the pool token it derives from) fired.
    Cancelled,
}

enum NextJob {
    Ready(Job),
    Drained,
    Cancelled,
}

/// Pulls jobs from the shared queue and runs the pipeline for each one.
///
/// Cancellation is checked between jobs only: a job that has been dequeued always runs its
/// pipeline to the end, while an idle worker waiting on an empty queue stops as soon as its
/// token fires.
pub struct Worker {
    pub id: usize,
    queue: Arc<JobQueue>,
    pipeline: Pipeline,
    shutdown: CancellationToken,
    telemetry: Arc<Telemetry>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<JobQueue>,
        pipeline: Pipeline,
        shutdown: CancellationToken,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            id,
            queue,
            pipeline,
            shutdown,
            telemetry,
        }
    }

    #[tracing::instrument(name = "worker", skip_all, fields(worker = self.id))]
    pub async fn run(self) -> WorkerExit {
        tracing::info!(worker = self.id, "worker task started");

        let exit = loop {
            if self.shutdown.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            match self.next_job().await {
                NextJob::Ready(job) => self.process(job).await,
                NextJob::Drained => break WorkerExit::Drained,
                NextJob::Cancelled => break WorkerExit::Cancelled,
            }
        };

        match exit {
            WorkerExit::Drained => {
                tracing::info!(worker = self.id, "job queue drained; worker finished")
            }
            WorkerExit::Cancelled => {
                tracing::info!(worker = self.id, "shutting down (cancelled)")
            }
        }
        self.telemetry.record_worker_exit(exit);
        exit
    }

    async fn next_job(&self) -> NextJob {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => NextJob::Cancelled,
            job = self.queue.dequeue() => match job {
                Some(job) => NextJob::Ready(job),
                None => NextJob::Drained,
            },
        }
    }

    async fn process(&self, job: Job) {
        tracing::info!(
            worker = self.id,
            job = job.id(),
            url = job.url(),
            "processing job"
        );
        self.telemetry.record_job_attempted();

        match self.pipeline.run(&job, &self.shutdown).await {
            Ok(record) => {
                self.telemetry.record_job_completed();
                tracing::info!(
                    worker = self.id,
                    job = job.id(),
                    record = record.id,
                    "completed job"
                );
            }
            Err(error) => {
                self.telemetry.record_job_failure(error.stage());
                tracing::warn!(
                    worker = self.id,
                    job = job.id(),
                    stage = ?error.stage(),
                    error = %error,
                    "job failed; skipping"
                );
            }
        }
    }
}
