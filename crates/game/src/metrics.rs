//! Process-wide atomic counters (C11), grounded on
//! `original_source/src/common/metrics.hpp`. The text exposition format
//! (`original_source/src/server/net/metrics_http.cpp`) is implemented by
//! `t2d-server::net::metrics_http`, which reads these fields.

use std::sync::atomic::{AtomicU64, Ordering};

/// Geometric tick-duration histogram: bucket 0 is `[0, 250us)`, bucket i is
/// `[250us << (i-1), 250us << i)`, doubling each step.
const HISTOGRAM_BASE_NS: u64 = 250_000;
const HISTOGRAM_BUCKETS: usize = 16;

#[derive(Default)]
pub struct Metrics {
    pub snapshot_full_bytes: AtomicU64,
    pub snapshot_delta_bytes: AtomicU64,
    pub snapshot_full_count: AtomicU64,
    pub snapshot_delta_count: AtomicU64,
    pub queue_depth: AtomicU64,
    pub active_matches: AtomicU64,
    pub bots_in_match: AtomicU64,
    pub connected_players: AtomicU64,
    pub projectiles_active: AtomicU64,
    pub auth_failures: AtomicU64,
    tick_duration_buckets: [AtomicU64; HISTOGRAM_BUCKETS],
    tick_duration_sum_ns: AtomicU64,
    tick_duration_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_full_snapshot(&self, bytes: usize) {
        self.snapshot_full_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.snapshot_full_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delta_snapshot(&self, bytes: usize) {
        self.snapshot_delta_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.snapshot_delta_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_duration(&self, duration: std::time::Duration) {
        let ns = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.tick_duration_sum_ns.fetch_add(ns, Ordering::Relaxed);
        self.tick_duration_count.fetch_add(1, Ordering::Relaxed);

        let mut bucket = 0usize;
        let mut threshold = HISTOGRAM_BASE_NS;
        while ns >= threshold && bucket < HISTOGRAM_BUCKETS - 1 {
            bucket += 1;
            threshold <<= 1;
        }
        self.tick_duration_buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_tick_ns(&self) -> u64 {
        let count = self.tick_duration_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.tick_duration_sum_ns.load(Ordering::Relaxed) / count
    }

    /// Approximate p99 by walking the histogram until 99% of samples are
    /// accounted for.
    pub fn p99_tick_ns(&self) -> u64 {
        let total = self.tick_duration_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        let target = (total * 99).div_ceil(100);
        let mut acc = 0u64;
        let mut threshold = 0u64;
        for (i, bucket) in self.tick_duration_buckets.iter().enumerate() {
            acc += bucket.load(Ordering::Relaxed);
            threshold = if i == 0 {
                HISTOGRAM_BASE_NS
            } else {
                HISTOGRAM_BASE_NS << i
            };
            if acc >= target {
                return threshold;
            }
        }
        threshold
    }

    pub fn histogram_buckets(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::with_capacity(HISTOGRAM_BUCKETS);
        let mut threshold = HISTOGRAM_BASE_NS;
        for (i, bucket) in self.tick_duration_buckets.iter().enumerate() {
            let le = if i == 0 { HISTOGRAM_BASE_NS } else { threshold };
            out.push((le, bucket.load(Ordering::Relaxed)));
            threshold <<= 1;
        }
        out
    }

    pub fn tick_duration_sum_ns(&self) -> u64 {
        self.tick_duration_sum_ns.load(Ordering::Relaxed)
    }

    pub fn tick_duration_count(&self) -> u64 {
        self.tick_duration_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_tick_duration() {
        let m = Metrics::new();
        m.record_tick_duration(std::time::Duration::from_micros(100));
        m.record_tick_duration(std::time::Duration::from_micros(300));
        assert_eq!(m.avg_tick_ns(), 200_000);
    }

    #[test]
    fn snapshot_counts() {
        let m = Metrics::new();
        m.record_full_snapshot(120);
        m.record_delta_snapshot(40);
        assert_eq!(m.snapshot_full_count.load(Ordering::Relaxed), 1);
        assert_eq!(m.snapshot_delta_count.load(Ordering::Relaxed), 1);
    }
}
