//! Library surface for `t2d-server`, split out of `main` so integration
//! tests can spin up a real listener (and matchmaker/match-runtime/
//! heartbeat/metrics tasks) against an ephemeral port without going through
//! CLI parsing or installing a process-wide logger.

pub mod config;
pub mod matchmaking;
pub mod net;
pub mod shutdown;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use t2d::net::auth::{AuthProvider, DisabledAuth, StubAuth};
use t2d::net::session::{SessionRegistry, SharedRegistry};
use t2d::Metrics;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use config::Config;
pub use shutdown::Shutdown;

/// Handles to every task a running server spawned, plus the shared state
/// a test (or `main`) needs to observe or tear it down.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub metrics_addr: Option<SocketAddr>,
    pub registry: SharedRegistry,
    pub metrics: Arc<Metrics>,
    pub shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Waits for every spawned task to finish (normally only after
    /// `shutdown.trigger()`).
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Binds the listen and (optional) metrics ports and spawns the listener,
/// matchmaker, heartbeat monitor, and metrics endpoint tasks. Does not spawn
/// the signal-handling task — callers own the process's signal policy.
pub async fn spawn(config: Config) -> Result<ServerHandle> {
    let registry: SharedRegistry = Arc::new(Mutex::new(SessionRegistry::new()));
    let metrics = Arc::new(Metrics::new());
    let shutdown = Shutdown::new();
    let auth: Arc<dyn AuthProvider> = match config.auth_mode.as_str() {
        "stub" => Arc::new(StubAuth::new(config.auth_stub_prefix.clone())),
        _ => Arc::new(DisabledAuth),
    };

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("binding listen port {}", config.listen_port))?;
    let addr = listener
        .local_addr()
        .context("reading bound listen address")?;

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(net::listener::run(
        listener,
        registry.clone(),
        auth,
        metrics.clone(),
        shutdown.clone(),
    )));

    tasks.push(tokio::spawn(matchmaking::matchmaker::run(
        registry.clone(),
        metrics.clone(),
        config.match_config(),
        config.fill_timeout_seconds,
        config.max_parallel_matches,
        config.matchmaker_poll_ms,
        shutdown.clone(),
    )));

    tasks.push(tokio::spawn(net::heartbeat::run(
        registry.clone(),
        config.heartbeat_timeout_seconds,
        metrics.clone(),
        shutdown.clone(),
    )));

    let metrics_addr = if config.metrics_port != 0 {
        let metrics_listener = TcpListener::bind(("0.0.0.0", config.metrics_port))
            .await
            .with_context(|| format!("binding metrics port {}", config.metrics_port))?;
        let metrics_addr = metrics_listener.local_addr().ok();
        tasks.push(tokio::spawn(net::metrics_http::run(
            metrics_listener,
            metrics.clone(),
            shutdown.clone(),
        )));
        metrics_addr
    } else {
        None
    };

    Ok(ServerHandle {
        addr,
        metrics_addr,
        registry,
        metrics,
        shutdown,
        tasks,
    })
}
