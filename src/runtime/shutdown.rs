use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Turns an external termination request into a single pool-wide cancellation.
///
/// The coordinator does not wait for workers to drain; callers still `join` the pool.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<ShutdownInner>,
}

struct ShutdownInner {
    shutdown: CancellationToken,
    triggered: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                shutdown,
                triggered: AtomicBool::new(false),
            }),
        }
    }

    /// Cancels the pool token. Only the first call has an effect; it returns `true`.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason, "shutdown already requested; ignoring");
            return false;
        }

        tracing::info!(reason, "received shutdown signal, waiting for workers to finish");
        self.inner.shutdown.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Waits for `event` in the background and triggers shutdown when it fires.
    ///
    /// The task resolves to `true` if it triggered the shutdown and `false` if the token was
    /// cancelled by someone else first.
    pub fn listen<F>(&self, event: F) -> JoinHandle<bool>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = event => coordinator.trigger("external termination request"),
                _ = coordinator.inner.shutdown.cancelled() => false,
            }
        })
    }
}

/// Resolves on the first Ctrl-C (SIGINT) or, on Unix, SIGTERM.
///
/// If no handler can be installed the future never resolves, so a broken signal setup cannot
/// masquerade as a termination request.
pub async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; listening for Ctrl-C only");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
