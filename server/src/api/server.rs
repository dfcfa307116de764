//! Ingestion server lifecycle
//!
//! `IngestServer` is shared behind an `Arc`: one task runs `listen_and_serve`
//! while another calls `close`. States move strictly forward:
//! `Idle -> Listening -> Draining -> Stopped`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use super::routes::health;
use super::routes::remote_write::{self, RemoteWriteState};
use crate::core::config::{IngestConfig, ServerConfig};
use crate::core::constants::HEALTH_PATH;
use crate::core::reporter::Reporter;
use crate::data::queues::DispatchQueues;
use crate::domain::consumers::{LogsConsumer, MetricsConsumer, TracesConsumer};
use crate::domain::error::ServerError;
use crate::domain::remote_write::Forwarder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Idle,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Idle => write!(f, "idle"),
            ServerState::Listening => write!(f, "listening"),
            ServerState::Draining => write!(f, "draining"),
            ServerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Everything the server needs before it can accept traffic
#[derive(Default)]
pub struct Collaborators {
    metrics: Option<Arc<dyn MetricsConsumer>>,
    traces: Option<Arc<dyn TracesConsumer>>,
    logs: Option<Arc<dyn LogsConsumer>>,
    reporter: Option<Arc<dyn Reporter>>,
    queues: Option<DispatchQueues>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsConsumer>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_traces(mut self, traces: Arc<dyn TracesConsumer>) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn with_logs(mut self, logs: Arc<dyn LogsConsumer>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_queues(mut self, queues: DispatchQueues) -> Self {
        self.queues = Some(queues);
        self
    }
}

/// Collaborators after validation
struct Wired {
    metrics: Arc<dyn MetricsConsumer>,
    traces: Arc<dyn TracesConsumer>,
    logs: Arc<dyn LogsConsumer>,
    reporter: Arc<dyn Reporter>,
    queues: DispatchQueues,
}

impl TryFrom<Collaborators> for Wired {
    type Error = ServerError;

    fn try_from(c: Collaborators) -> Result<Self, Self::Error> {
        let missing = |what: &str| ServerError::Configuration(format!("{} is not set", what));
        Ok(Self {
            metrics: c.metrics.ok_or_else(|| missing("metrics consumer"))?,
            logs: c.logs.ok_or_else(|| missing("logs consumer"))?,
            traces: c.traces.ok_or_else(|| missing("traces consumer"))?,
            reporter: c.reporter.ok_or_else(|| missing("reporter"))?,
            queues: c.queues.ok_or_else(|| missing("dispatch queues"))?,
        })
    }
}

pub struct IngestServer {
    server: ServerConfig,
    ingest: IngestConfig,
    state: Mutex<ServerState>,
    state_tx: watch::Sender<ServerState>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
    shutdown_tx: watch::Sender<bool>,
}

impl IngestServer {
    pub fn new(server: ServerConfig, ingest: IngestConfig) -> Arc<Self> {
        Arc::new(Self {
            server,
            ingest,
            state: Mutex::new(ServerState::Idle),
            state_tx: watch::Sender::new(ServerState::Idle),
            addr_tx: watch::Sender::new(None),
            shutdown_tx: watch::Sender::new(false),
        })
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Bound address once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr_tx.borrow()
    }

    /// Wait until the listener is bound. Returns None if the server stopped
    /// without ever binding.
    pub async fn wait_listening(&self) -> Option<SocketAddr> {
        let mut addr_rx = self.addr_tx.subscribe();
        let mut state_rx = self.state_tx.subscribe();
        tokio::select! {
            addr = async { addr_rx.wait_for(Option::is_some).await.ok().and_then(|a| *a) } => addr,
            _ = async { let _ = state_rx.wait_for(|s| *s == ServerState::Stopped).await; } => {
                self.local_addr()
            }
        }
    }

    /// The watch is only written while the state lock is held, so watchers
    /// see states in the same order as the lock does.
    fn set_state(&self, next: ServerState) {
        let mut state = self.state.lock();
        *state = next;
        self.state_tx.send_replace(next);
        tracing::debug!(state = %next, "Ingest server state changed");
    }

    /// Validate collaborators, bind, and serve until `close` completes or the
    /// transport fails.
    pub async fn listen_and_serve(&self, collaborators: Collaborators) -> Result<(), ServerError> {
        let wired = Wired::try_from(collaborators)?;

        if !self.server.write_path.starts_with('/') || self.server.write_path == HEALTH_PATH {
            return Err(ServerError::Configuration(format!(
                "invalid write path '{}'",
                self.server.write_path
            )));
        }

        {
            let mut state = self.state.lock();
            if *state != ServerState::Idle {
                return Err(ServerError::Configuration(format!(
                    "listen_and_serve called while {}",
                    *state
                )));
            }
            *state = ServerState::Listening;
        }

        let bind_addr = format!("{}:{}", self.server.host, self.server.port);
        let listener = match TcpListener::bind((self.server.host.as_str(), self.server.port)).await
        {
            Ok(listener) => listener,
            Err(source) => {
                self.set_state(ServerState::Stopped);
                return Err(ServerError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.set_state(ServerState::Stopped);
                return Err(ServerError::Serve(e));
            }
        };
        self.addr_tx.send_replace(Some(local_addr));
        {
            // close() may have moved us to Draining while the bind was pending
            let state = self.state.lock();
            self.state_tx.send_replace(*state);
        }

        let Wired {
            metrics,
            traces,
            logs,
            reporter,
            queues,
        } = wired;
        let (senders, receivers) = queues.into_parts();

        let (drain_tx, drain_rx) = watch::channel(false);
        let forwarder =
            Forwarder::new(metrics, traces, Arc::clone(&reporter)).start(receivers, drain_rx);

        let state = RemoteWriteState {
            queues: senders,
            logs,
            reporter,
            retry_after_secs: self.ingest.retry_after_secs,
            max_body_bytes: self.ingest.max_body_bytes,
            max_decompressed_bytes: self.ingest.max_decompressed_bytes,
        };
        let router = Router::new()
            .route(HEALTH_PATH, get(health::health))
            .merge(remote_write::routes(&self.server.write_path, state))
            .layer(TraceLayer::new_for_http());

        tracing::info!(
            addr = %local_addr,
            write_path = %self.server.write_path,
            "Remote write receiver listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|&v| v).await;
            })
            .await;

        // All request handlers are done; let the forwarder flush what they queued
        {
            let mut state = self.state.lock();
            if *state == ServerState::Listening {
                *state = ServerState::Draining;
                self.state_tx.send_replace(ServerState::Draining);
            }
        }
        drain_tx.send_replace(true);
        match forwarder.await {
            Ok(stats) => tracing::debug!(
                forwarded = stats.forwarded,
                failed = stats.failed,
                trace_links = stats.trace_links,
                "Dispatch queues drained"
            ),
            Err(e) => tracing::error!(error = %e, "Forwarder task failed"),
        }

        self.set_state(ServerState::Stopped);
        served.map_err(ServerError::Serve)
    }

    /// Stop accepting connections, wait for in-flight requests and queued
    /// entities, then return. No-op when idle or already stopped.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                ServerState::Idle | ServerState::Stopped => return,
                ServerState::Listening => {
                    *state = ServerState::Draining;
                    self.state_tx.send_replace(ServerState::Draining);
                }
                ServerState::Draining => {}
            }
        }

        tracing::debug!("Closing ingest server");
        self.shutdown_tx.send_replace(true);

        let mut state_rx = self.state_tx.subscribe();
        let _ = state_rx
            .wait_for(|s| *s == ServerState::Stopped)
            .await;
    }
}
