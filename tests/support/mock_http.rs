use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Todos served by [`MockTodoServer`], with per-id failure injection.
#[derive(Clone, Default)]
pub struct TodoCatalog {
    inner: Arc<RwLock<CatalogInner>>,
}

#[derive(Default)]
struct CatalogInner {
    status_overrides: HashMap<u64, StatusCode>,
    malformed: HashSet<u64>,
    stalled: HashSet<u64>,
    requests: HashMap<u64, usize>,
}

impl TodoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with_status(&self, id: u64, status: StatusCode) {
        self.write().status_overrides.insert(id, status);
    }

    pub fn respond_with_garbage(&self, id: u64) {
        self.write().malformed.insert(id);
    }

    /// Requests for `id` never get an answer.
    pub fn stall(&self, id: u64) {
        self.write().stalled.insert(id);
    }

    pub fn request_count(&self, id: u64) -> usize {
        self.inner
            .read()
            .expect("catalog poisoned")
            .requests
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn wait_for_request(&self, id: u64, timeout: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        while self.request_count(id) == 0 {
            if start.elapsed() > timeout {
                bail!("todo {id} was not requested within {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogInner> {
        self.inner.write().expect("catalog poisoned")
    }

    fn record_request(&self, id: u64) -> Reply {
        let mut inner = self.write();
        *inner.requests.entry(id).or_insert(0) += 1;

        if inner.stalled.contains(&id) {
            Reply::Stall
        } else if let Some(status) = inner.status_overrides.get(&id) {
            Reply::Status(*status)
        } else if inner.malformed.contains(&id) {
            Reply::Body("<html>upstream error</html>".to_string())
        } else {
            Reply::Body(
                json!({
                    "userId": 1,
                    "id": id,
                    "title": format!("todo {id}"),
                    "completed": id % 2 == 0,
                })
                .to_string(),
            )
        }
    }
}

enum Reply {
    Body(String),
    Status(StatusCode),
    Stall,
}

pub struct MockTodoServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockTodoServer {
    pub async fn start(catalog: TodoCatalog) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock HTTP listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let catalog = catalog.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(catalog.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock HTTP server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn todo_url(&self, id: u64) -> String {
        format!("{}/todos/{id}", self.url)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            // Stalled requests keep graceful shutdown pending; don't let them hang the test.
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
    }
}

async fn serve_request(
    catalog: TodoCatalog,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(status_response(StatusCode::METHOD_NOT_ALLOWED));
    }

    let id = req
        .uri()
        .path()
        .strip_prefix("/todos/")
        .and_then(|segment| segment.parse::<u64>().ok());
    let Some(id) = id else {
        return Ok(status_response(StatusCode::NOT_FOUND));
    };

    match catalog.record_request(id) {
        Reply::Body(body) => {
            let mut response = Response::new(Body::from(body));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            Ok(response)
        }
        Reply::Status(status) => Ok(status_response(status)),
        Reply::Stall => {
            std::future::pending::<()>().await;
            Ok(status_response(StatusCode::GATEWAY_TIMEOUT))
        }
    }
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(status.to_string()));
    *response.status_mut() = status;
    response
}
