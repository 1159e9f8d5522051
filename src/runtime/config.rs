use crate::pipeline::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::pipeline::store::DEFAULT_MAX_DB_CONNECTIONS;
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

const DEFAULT_WORKER_COUNT: usize = 10;

/// Runtime configuration for the fetch pool.
///
/// All instances must be constructed via [`PoolConfig::builder`] or [`PoolConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    worker_count: usize,
    queue_capacity: Option<usize>,
    fetch_timeout: Duration,
    max_db_connections: u32,
    metrics_interval: Duration,
}

pub struct PoolConfigParams {
    pub database_url: String,
    pub worker_count: usize,
    pub queue_capacity: Option<usize>,
    pub fetch_timeout: Duration,
    pub max_db_connections: u32,
    pub metrics_interval: Duration,
}

impl PoolConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    pub fn new(params: PoolConfigParams) -> Result<Self> {
        let PoolConfigParams {
            database_url,
            worker_count,
            queue_capacity,
            fetch_timeout,
            max_db_connections,
            metrics_interval,
        } = params;

        let config = Self {
            database_url: database_url.trim().to_owned(),
            worker_count,
            queue_capacity,
            fetch_timeout,
            max_db_connections,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Postgres connection string used by the store.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Number of workers launched by the pool.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Job queue capacity. `None` sizes the queue to the number of jobs in the run.
    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    /// Per-request timeout of the HTTP fetcher.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Upper bound on pooled database connections.
    pub fn max_db_connections(&self) -> u32 {
        self.max_db_connections
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    pub fn validate(&self) -> Result<()> {
        validate_database_url(&self.database_url)?;

        if self.worker_count == 0 {
            bail!("worker_count must be greater than 0");
        }

        if self.queue_capacity == Some(0) {
            bail!("queue_capacity must be greater than 0 when set");
        }

        if self.fetch_timeout.is_zero() {
            bail!("fetch_timeout must be greater than 0");
        }

        if self.max_db_connections == 0 {
            bail!("max_db_connections must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PoolConfigBuilder {
    database_url: Option<String>,
    worker_count: Option<usize>,
    queue_capacity: Option<usize>,
    fetch_timeout: Option<Duration>,
    max_db_connections: Option<u32>,
    metrics_interval: Option<Duration>,
}

impl PoolConfigBuilder {
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn max_db_connections(mut self, connections: u32) -> Self {
        self.max_db_connections = Some(connections);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        let params = PoolConfigParams {
            database_url: self.database_url.context("database_url is required")?,
            worker_count: self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
            queue_capacity: self.queue_capacity,
            fetch_timeout: self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
            max_db_connections: self
                .max_db_connections
                .unwrap_or(DEFAULT_MAX_DB_CONNECTIONS),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        PoolConfig::new(params)
    }
}

fn validate_database_url(url: &str) -> Result<()> {
    if url.is_empty() {
        bail!("database_url cannot be empty");
    }
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        bail!("database_url must start with postgres:// or postgresql://");
    }
    Ok(())
}
