//! Per-job collaborators invoked by the workers: fetch the payload, decode it
//! into a [`Record`], and persist the record. Each step is a trait so the pool
//! can run against HTTP/Postgres in production and scripted doubles in tests.

pub mod fetch;
pub mod parse;
pub mod store;


use crate::jobs::job::{Job, Record};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use fetch::{FetchError, Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use parse::{JsonTodoParser, ParseError, RecordParser};
pub use store::{PostgresStore, RecordStore, StoreError, DEFAULT_MAX_DB_CONNECTIONS};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Step of the per-job pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Fetch,
    Parse,
    Store,
}

/// Failure of a single job. Workers log it and move on; it never ends a worker.
#[derive(Debug)]
pub enum JobError {
    Fetch(FetchError),
    Parse(ParseError),
    Store(StoreError),
}

impl JobError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            JobError::Fetch(_) => PipelineStage::Fetch,
            JobError::Parse(_) => PipelineStage::Parse,
            JobError::Store(_) => PipelineStage::Store,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Fetch(err) => write!(f, "download failed: {err}"),
            JobError::Parse(err) => write!(f, "parse failed: {err}"),
            JobError::Store(err) => write!(f, "database insert failed: {err}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Fetch(err) => Some(err),
            JobError::Parse(err) => Some(err),
            JobError::Store(err) => Some(err),
        }
    }
}

/// The fetch → parse → store chain shared by every worker.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn RecordParser>,
    store: Arc<dyn RecordStore>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn RecordParser>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
        }
    }

    /// Runs every step for `job`, stopping at the first failure.
    ///
    /// The token is only handed to the fetcher; parse and store always run to completion once
    /// started.
    pub async fn run(&self, job: &Job, shutdown: &CancellationToken) -> Result<Record, JobError> {
        let payload = self
            .fetcher
            .fetch(job.url(), shutdown)
            .await
            .map_err(JobError::Fetch)?;
        tracing::debug!(job = job.id(), bytes = payload.len(), "payload fetched");

        let record = self.parser.parse(&payload).map_err(JobError::Parse)?;
        tracing::debug!(job = job.id(), record = record.id, "payload parsed");

        self.store.store(&record).await.map_err(JobError::Store)?;
        Ok(record)
    }
}
