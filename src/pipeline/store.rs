use super::BoxError;
use crate::jobs::job::Record;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;

pub const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;

const INSERT_TODO: &str = "INSERT INTO todos (id, title, completed) VALUES ($1, $2, $3)";
const CREATE_TODOS: &str = "CREATE TABLE IF NOT EXISTS todos (
    id BIGINT PRIMARY KEY,
    title TEXT NOT NULL,
    completed BOOLEAN NOT NULL
)";

#[derive(Debug)]
pub enum StoreError {
    /// The row violated a table constraint (duplicate id, null title, ...).
    Constraint { record_id: i64, source: BoxError },
    /// The database could not be reached or the pool gave up waiting for a connection.
    Connection { record_id: i64, source: BoxError },
    /// Any other failure while building or executing the insert.
    Query { record_id: i64, source: BoxError },
}

impl StoreError {
    pub fn record_id(&self) -> i64 {
        match self {
            StoreError::Constraint { record_id, .. }
            | StoreError::Connection { record_id, .. }
            | StoreError::Query { record_id, .. } => *record_id,
        }
    }

    fn from_sqlx(record_id: i64, err: sqlx::Error) -> Self {
        let constraint = matches!(
            &err,
            sqlx::Error::Database(db) if matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            )
        );
        let connection = matches!(
            &err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );

        let source: BoxError = Box::new(err);
        if constraint {
            StoreError::Constraint { record_id, source }
        } else if connection {
            StoreError::Connection { record_id, source }
        } else {
            StoreError::Query { record_id, source }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Constraint { record_id, source } => {
                write!(f, "todo {record_id} violates a table constraint: {source}")
            }
            StoreError::Connection { record_id, source } => {
                write!(f, "lost database connection inserting todo {record_id}: {source}")
            }
            StoreError::Query { record_id, source } => {
                write!(f, "failed to insert todo {record_id}: {source}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Constraint { source, .. }
            | StoreError::Connection { source, .. }
            | StoreError::Query { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Persists parsed records. Shared by every worker, so implementations must be safe for
/// concurrent use.
pub trait RecordStore: Send + Sync {
    fn store<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Inserts records into the Postgres `todos` table through a bounded connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Opens a pool of at most `max_connections` and pings the server before returning.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to open database")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("failed to ping database")?;

        tracing::info!(max_connections, "database connected");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `todos` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TODOS)
            .execute(&self.pool)
            .await
            .context("failed to create todos table")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        sqlx::query(INSERT_TODO)
            .bind(record.id)
            .bind(&record.title)
            .bind(record.completed)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| StoreError::from_sqlx(record.id, err))
    }
}

impl RecordStore for PostgresStore {
    fn store<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.insert(record))
    }
}
