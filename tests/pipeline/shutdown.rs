use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    helpers::{http_pipeline, init_tracing, test_config, RecordingStore},
    mock_http::{MockTodoServer, TodoCatalog},
};
use anyhow::{Context, Result};
use fetchpool::{
    FatalErrorHandler, JobQueue, Runner, ShutdownCoordinator, Telemetry, WorkerPool,
    WorkerPoolParams,
};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn termination_event_stops_run_after_in_flight_job() -> Result<()> {
    init_tracing();
    let catalog = TodoCatalog::new();
    catalog.stall(2);
    let server = MockTodoServer::start(catalog.clone()).await?;
    let store = RecordingStore::new();

    let shutdown = CancellationToken::new();
    let runner = Runner::with_cancellation_token(
        test_config(1),
        http_pipeline(store.clone()),
        shutdown.clone(),
    );
    let coordinator = ShutdownCoordinator::new(shutdown.clone());
    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let listener = coordinator.listen(async move {
        let _ = signal_rx.await;
    });

    let urls: Vec<String> = (1..=4).map(|id| server.todo_url(id)).collect();
    let run = tokio::spawn(async move { runner.run(urls).await });

    catalog.wait_for_request(2, Duration::from_secs(5)).await?;
    signal_tx.send(()).expect("listener is waiting");

    let summary = timeout(Duration::from_secs(5), run)
        .await
        .context("run should stop after the termination event")???;

    assert!(listener.await?, "coordinator triggered the shutdown");
    assert!(!coordinator.trigger("second signal"), "later events are ignored");
    assert_eq!(store.stored_ids(), vec![1]);
    assert_eq!(summary.telemetry.jobs_attempted, 2);
    assert_eq!(summary.telemetry.fetch_failures, 1, "stalled fetch aborted");
    assert_eq!(summary.telemetry.workers_cancelled, 1);
    assert_eq!(catalog.request_count(3), 0, "no job starts after cancellation");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_every_worker_unblocks_join_on_open_queue() -> Result<()> {
    init_tracing();
    let shutdown = CancellationToken::new();
    let queue = Arc::new(JobQueue::with_capacity(4));
    let telemetry = Arc::new(Telemetry::default());
    let pool = WorkerPool::new(WorkerPoolParams {
        worker_count: 3,
        shutdown: shutdown.clone(),
        queue: queue.clone(),
        pipeline: http_pipeline(RecordingStore::new()),
        telemetry: telemetry.clone(),
        fatal_handler: Arc::new(FatalErrorHandler::new(shutdown.clone())),
    });
    pool.start()?;

    for worker_id in pool.registered_workers() {
        assert!(pool.cancel_worker(worker_id));
        assert!(!pool.cancel_worker(worker_id));
    }

    timeout(Duration::from_secs(2), pool.join())
        .await
        .context("join should return once every worker is cancelled")??;
    assert!(!shutdown.is_cancelled(), "per-worker cancellation leaves the pool token alone");
    assert_eq!(telemetry.snapshot().workers_cancelled, 3);
    assert!(!queue.is_closed().await);
    Ok(())
}
