pub mod jobs;
pub mod pipeline;
pub mod pool;
pub mod runtime;

pub use jobs::job::{jobs_from_urls, Job, Record};
pub use jobs::queue::{JobQueue, QueueError};
pub use jobs::source::{parse_url_list, read_url_list};
pub use pipeline::{
    FetchError, Fetcher, HttpFetcher, JobError, JsonTodoParser, ParseError, Pipeline,
    PipelineStage, PostgresStore, RecordParser, RecordStore, StoreError, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_DB_CONNECTIONS,
};
pub use pool::supervisor::{WorkerHandle, WorkerPool, WorkerPoolParams};
pub use pool::worker::{Worker, WorkerExit};
pub use runtime::config::{PoolConfig, PoolConfigBuilder, PoolConfigParams};
pub use runtime::fatal::FatalErrorHandler;
pub use runtime::runner::{RunSummary, Runner};
pub use runtime::shutdown::{termination_signal, ShutdownCoordinator};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
