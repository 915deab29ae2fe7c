//! Metrics HTTP endpoint (C11), translated from
//! `original_source/src/server/net/metrics_http.cpp`'s `run_metrics_endpoint`
//! / `build_metrics_body`: a naive `GET /metrics` prefix match over a
//! Prometheus text exposition body, 404 otherwise, `Connection: close`
//! always.

use std::sync::Arc;

use t2d::Metrics;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::shutdown::Shutdown;

pub async fn run(listener: TcpListener, metrics: Arc<Metrics>, shutdown: Shutdown) {
    log::info!("metrics endpoint listening on {:?}", listener.local_addr());

    loop {
        if shutdown.is_set() {
            break;
        }

        let accept = tokio::time::timeout(std::time::Duration::from_millis(200), listener.accept());
        match accept.await {
            Ok(Ok((stream, _addr))) => {
                let metrics = metrics.clone();
                tokio::spawn(handle_client(stream, metrics));
            }
            Ok(Err(e)) => {
                log::error!("metrics accept error: {e}");
                break;
            }
            Err(_timeout) => continue,
        }
    }
}

async fn handle_client(mut stream: tokio::net::TcpStream, metrics: Arc<Metrics>) {
    let mut buf = [0u8; 512];
    let n = match tokio::time::timeout(std::time::Duration::from_millis(500), stream.read(&mut buf)).await
    {
        Ok(Ok(n)) => n,
        _ => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);

    let response = if request.starts_with("GET /metrics") {
        let body = build_metrics_body(&metrics);
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    } else {
        let body = "not found";
        format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    };

    let _ = stream.write_all(response.as_bytes()).await;
}

fn build_metrics_body(metrics: &Metrics) -> String {
    use std::sync::atomic::Ordering::Relaxed;
    let mut out = String::new();

    macro_rules! counter {
        ($name:expr, $help:expr, $value:expr) => {
            out.push_str(&format!("# TYPE {} counter\n{} {}\n", $name, $name, $value));
        };
    }
    macro_rules! gauge {
        ($name:expr, $value:expr) => {
            out.push_str(&format!("# TYPE {} gauge\n{} {}\n", $name, $name, $value));
        };
    }

    counter!(
        "t2d_snapshot_full_bytes",
        "total bytes sent in full snapshots",
        metrics.snapshot_full_bytes.load(Relaxed)
    );
    counter!(
        "t2d_snapshot_delta_bytes",
        "total bytes sent in delta snapshots",
        metrics.snapshot_delta_bytes.load(Relaxed)
    );
    counter!(
        "t2d_snapshot_full_count",
        "number of full snapshots sent",
        metrics.snapshot_full_count.load(Relaxed)
    );
    counter!(
        "t2d_snapshot_delta_count",
        "number of delta snapshots sent",
        metrics.snapshot_delta_count.load(Relaxed)
    );
    gauge!("t2d_queue_depth", metrics.queue_depth.load(Relaxed));
    gauge!("t2d_active_matches", metrics.active_matches.load(Relaxed));
    gauge!("t2d_bots_in_match", metrics.bots_in_match.load(Relaxed));
    gauge!(
        "t2d_connected_players",
        metrics.connected_players.load(Relaxed)
    );
    gauge!(
        "t2d_projectiles_active",
        metrics.projectiles_active.load(Relaxed)
    );
    gauge!("t2d_avg_tick_ns", metrics.avg_tick_ns());
    gauge!("t2d_p99_tick_ns", metrics.p99_tick_ns());
    counter!(
        "t2d_auth_failures",
        "authentication failures",
        metrics.auth_failures.load(Relaxed)
    );

    out.push_str("# TYPE t2d_tick_duration_ns histogram\n");
    let mut cumulative = 0u64;
    for (le, count) in metrics.histogram_buckets() {
        cumulative += count;
        out.push_str(&format!(
            "t2d_tick_duration_ns_bucket{{le=\"{}\"}} {}\n",
            le, cumulative
        ));
    }
    out.push_str(&format!(
        "t2d_tick_duration_ns_bucket{{le=\"+Inf\"}} {}\n",
        cumulative
    ));
    out.push_str(&format!(
        "t2d_tick_duration_ns_sum {}\n",
        metrics.tick_duration_sum_ns()
    ));
    out.push_str(&format!(
        "t2d_tick_duration_ns_count {}\n",
        metrics.tick_duration_count()
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_body_includes_all_documented_fields() {
        let metrics = Metrics::new();
        metrics.record_full_snapshot(100);
        let body = build_metrics_body(&metrics);
        assert!(body.contains("t2d_snapshot_full_bytes"));
        assert!(body.contains("t2d_avg_tick_ns"));
        assert!(body.contains("t2d_auth_failures"));
        assert!(body.contains("t2d_tick_duration_ns_bucket"));
    }
}
