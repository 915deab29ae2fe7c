//! Heartbeat monitor (C10). Sweeps every 5 seconds and disconnects any
//! session whose last heartbeat is older than `heartbeat_timeout_seconds`,
//! per SPEC_FULL §4.10.

use std::sync::Arc;
use std::time::{Duration, Instant};

use t2d::net::session::SharedRegistry;
use t2d::Metrics;

use crate::shutdown::Shutdown;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run(
    registry: SharedRegistry,
    heartbeat_timeout_seconds: u64,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) {
    let timeout = Duration::from_secs(heartbeat_timeout_seconds);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
        }
        if shutdown.is_set() {
            break;
        }

        let now = Instant::now();
        let stale: Vec<_> = {
            let reg = registry.lock().unwrap();
            reg.session_ids()
                .into_iter()
                .filter_map(|session_id| {
                    let handle = reg.handle_by_session_id(&session_id)?;
                    let session = reg.get(handle)?;
                    let last = session.last_heartbeat?;
                    if now.duration_since(last) > timeout {
                        Some(handle)
                    } else {
                        None
                    }
                })
                .collect()
        };

        if !stale.is_empty() {
            let mut reg = registry.lock().unwrap();
            for handle in stale {
                reg.disconnect_session(handle);
            }
            metrics
                .connected_players
                .store(reg.connected_players, std::sync::atomic::Ordering::Relaxed);
        }
    }
}
