// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/stats/worker_stats.rs
//
// Per-worker statistics. The interval counter is the hot-path hash counter:
// written only by the owning worker thread, drained atomically by the manager
// during update. Everything else is bookkeeping off the hot path.
//
// Tree Location:
// - src/miner/stats/worker_stats.rs (per-worker statistics logic)
// - Depends on: std

use std::sync::atomic::{AtomicU64, Ordering};

pub struct WorkerStats {
    label: String,
    /// Hashes since the manager last drained this counter.
    interval_hashes: AtomicU64,
    /// Hashes over the worker's whole lifetime.
    lifetime_hashes: AtomicU64,
    solutions_found: AtomicU64,
    /// Highest per-interval rate observed, hashes/second.
    peak_rate: AtomicU64,
}

impl WorkerStats {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval_hashes: AtomicU64::new(0),
            lifetime_hashes: AtomicU64::new(0),
            solutions_found: AtomicU64::new(0),
            peak_rate: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Called by the owning worker after each hash batch.
    pub fn add_hashes(&self, count: u64) {
        self.interval_hashes.fetch_add(count, Ordering::Relaxed);
        self.lifetime_hashes.fetch_add(count, Ordering::Relaxed);
    }

    /// Drain the interval counter. Called by the manager during update; the
    /// swap keeps the counter consistent without pausing the worker.
    pub fn take_interval(&self) -> u64 {
        self.interval_hashes.swap(0, Ordering::Relaxed)
    }

    pub fn record_solution(&self) {
        self.solutions_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record this worker's rate for the last interval, tracking the peak.
    pub fn note_rate(&self, rate: u64) {
        if rate > self.peak_rate.load(Ordering::Relaxed) {
            self.peak_rate.store(rate, Ordering::Relaxed);
        }
    }

    pub fn lifetime_hashes(&self) -> u64 {
        self.lifetime_hashes.load(Ordering::Relaxed)
    }

    pub fn solutions_found(&self) -> u64 {
        self.solutions_found.load(Ordering::Relaxed)
    }

    pub fn peak_rate(&self) -> u64 {
        self.peak_rate.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_drain_preserves_lifetime() {
        let stats = WorkerStats::new("cpu-0");
        stats.add_hashes(1000);
        stats.add_hashes(500);
        assert_eq!(stats.take_interval(), 1500);
        assert_eq!(stats.take_interval(), 0);
        assert_eq!(stats.lifetime_hashes(), 1500);
    }

    #[test]
    fn peak_rate_only_rises() {
        let stats = WorkerStats::new("gpu");
        stats.note_rate(100);
        stats.note_rate(50);
        assert_eq!(stats.peak_rate(), 100);
        stats.note_rate(200);
        assert_eq!(stats.peak_rate(), 200);
    }
}
