//! Listener (C6), grounded on
//! `original_source/src/server/net/listener.cpp`'s `run_listener` accept
//! loop, translated from its coroutine scheduler to a `tokio` accept loop.

use std::sync::Arc;

use t2d::net::auth::AuthProvider;
use t2d::net::session::SharedRegistry;
use t2d::Metrics;
use tokio::net::TcpListener;

use crate::net::connection;
use crate::shutdown::Shutdown;

pub async fn run(
    listener: TcpListener,
    registry: SharedRegistry,
    auth: Arc<dyn AuthProvider>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) {
    log::info!("listening on {:?}", listener.local_addr());

    loop {
        if shutdown.is_set() {
            break;
        }

        let accept = tokio::time::timeout(std::time::Duration::from_millis(200), listener.accept());
        match accept.await {
            Ok(Ok((stream, addr))) => {
                log::debug!("accepted connection from {addr}");
                let registry = registry.clone();
                let auth = auth.clone();
                let metrics = metrics.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    connection::run(stream, registry, auth, metrics, shutdown).await;
                });
            }
            Ok(Err(e)) => {
                log::error!("accept error: {e}");
                break;
            }
            Err(_timeout) => continue,
        }
    }

    log::info!("listener shutting down");
}
