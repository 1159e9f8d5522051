use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, postgres_test_url},
    mock_http::{MockTodoServer, TodoCatalog},
};
use anyhow::{Context, Result};
use fetchpool::{
    HttpFetcher, JsonTodoParser, Pipeline, PoolConfig, PostgresStore, Runner,
    DEFAULT_MAX_DB_CONNECTIONS,
};
use hyper::StatusCode;
use tokio::time::timeout;

const TEST_IDS: [i64; 4] = [910_001, 910_002, 910_003, 910_004];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn records_land_in_todos_table() -> Result<()> {
    let Some(database_url) = postgres_test_url() else {
        eprintln!("FETCHPOOL_TEST_DATABASE_URL not set; skipping Postgres pipeline test");
        return Ok(());
    };
    init_tracing();

    let store = PostgresStore::connect(&database_url, 4).await?;
    store.ensure_schema().await?;
    sqlx::query("DELETE FROM todos WHERE id = ANY($1)")
        .bind(TEST_IDS.to_vec())
        .execute(store.pool())
        .await
        .context("failed to clear test rows")?;

    let catalog = TodoCatalog::new();
    catalog.respond_with_status(TEST_IDS[2] as u64, StatusCode::NOT_FOUND);
    let server = MockTodoServer::start(catalog).await?;

    let config = PoolConfig::builder()
        .database_url(database_url.clone())
        .worker_count(2)
        .max_db_connections(DEFAULT_MAX_DB_CONNECTIONS)
        .build()?;
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new(config.fetch_timeout())?),
        Arc::new(JsonTodoParser),
        Arc::new(store.clone()),
    );
    let runner = Runner::new(config, pipeline);

    // The first id appears twice; the second insert hits the primary key.
    let mut urls: Vec<String> = TEST_IDS.iter().map(|&id| server.todo_url(id as u64)).collect();
    urls.push(server.todo_url(TEST_IDS[0] as u64));

    let summary = timeout(Duration::from_secs(10), runner.run(urls))
        .await
        .context("run did not finish")??;

    assert_eq!(summary.telemetry.jobs_attempted, 5);
    assert_eq!(summary.telemetry.fetch_failures, 1);
    assert_eq!(summary.telemetry.store_failures, 1);
    assert_eq!(summary.jobs_completed(), 3);

    let mut stored: Vec<i64> = sqlx::query_scalar("SELECT id FROM todos WHERE id = ANY($1)")
        .bind(TEST_IDS.to_vec())
        .fetch_all(store.pool())
        .await?;
    stored.sort_unstable();
    assert_eq!(stored, vec![TEST_IDS[0], TEST_IDS[1], TEST_IDS[3]]);

    let (title, completed): (String, bool) =
        sqlx::query_as("SELECT title, completed FROM todos WHERE id = $1")
            .bind(TEST_IDS[1])
            .fetch_one(store.pool())
            .await?;
    assert_eq!(title, format!("todo {}", TEST_IDS[1]));
    assert!(completed);

    sqlx::query("DELETE FROM todos WHERE id = ANY($1)")
        .bind(TEST_IDS.to_vec())
        .execute(store.pool())
        .await?;
    server.shutdown().await;
    store.close().await;
    Ok(())
}
