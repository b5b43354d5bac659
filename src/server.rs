use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use slog::{info, o, Discard, Logger};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::counter::{AtomicCounter, Counter};
use crate::error::{Error, ErrorKind, Result};

/// Simulated processing time of `GET /`.
pub const WORK_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone)]
struct AppState {
    requests: Arc<AtomicCounter>,
}

/// HTTP server counting the requests made to `/`.
pub struct Server {
    addr: SocketAddr,
    requests: Arc<AtomicCounter>,
    logger: Logger,
}

impl Server {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_logger(addr, Logger::root(Discard, o!()))
    }

    pub fn with_logger(addr: SocketAddr, logger: Logger) -> Self {
        Server {
            addr,
            requests: Arc::new(AtomicCounter::new()),
            logger,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/stats", get(stats))
            .with_state(AppState {
                requests: Arc::clone(&self.requests),
            })
    }

    pub fn request_count(&self) -> u64 {
        self.requests.value()
    }

    /// Binds the listener and serves in the background until
    /// [`RunningServer::stop`].
    pub async fn start(self) -> Result<RunningServer> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router();
        let (shutdown, signal) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        info!(self.logger, "server listening"; "addr" => %local_addr);
        Ok(RunningServer {
            local_addr,
            requests: self.requests,
            shutdown: Some(shutdown),
            handle,
            logger: self.logger,
        })
    }
}

pub struct RunningServer {
    local_addr: SocketAddr,
    requests: Arc<AtomicCounter>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<io::Result<()>>,
    logger: Logger,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn request_count(&self) -> u64 {
        self.requests.value()
    }

    /// Stops accepting connections and waits up to `timeout` for in-flight
    /// requests to finish.
    pub async fn stop(mut self, timeout: Duration) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        info!(self.logger, "server shutting down"; "requests" => self.requests.value());

        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(served)) => served.map_err(Error::from),
            Ok(Err(e)) => Err(ErrorKind::Server(e.to_string()).into()),
            Err(_) => {
                self.handle.abort();
                Err(ErrorKind::ShutdownTimeout(timeout).into())
            }
        }
    }
}

async fn root(State(state): State<AppState>) -> String {
    let count = state.requests.increment();
    tokio::time::sleep(WORK_DELAY).await;
    format!("Hello! Request count: {}\n", count)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    format: Option<String>,
}

#[derive(Debug, Serialize)]
struct Stats {
    total_requests: u64,
}

async fn stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> Response {
    let total_requests = state.requests.value();
    match query.format.as_deref() {
        Some("json") => Json(Stats { total_requests }).into_response(),
        _ => format!("Total requests: {}", total_requests).into_response(),
    }
}
