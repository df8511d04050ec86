// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/worker.rs
//
// Worker-side plumbing shared by CPU and GPU workers: the work board that
// publishes the current generation lock-free, the context handed to every
// spawned worker, and the capability trait the manager uses to treat both
// worker kinds uniformly for aggregation, restart and shutdown.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam::channel::Sender;

use crate::core::types::{Solution, Work};
use crate::miner::stats::WorkerStats;
use crate::utils::error::Result;

/// Single-writer, many-reader slot holding the current work generation.
///
/// The manager is the only writer. Workers snapshot it between hash batches;
/// staleness is detected by comparing generation tags, never by locking. The
/// previous generation is freed by reference counting once the last worker
/// drops its snapshot.
pub struct WorkBoard {
    current: ArcSwapOption<Work>,
}

impl WorkBoard {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Atomically replace the published work. Readers mid-batch keep their
    /// old snapshot and pick the new generation up at the next batch edge.
    pub fn publish(&self, work: Arc<Work>) {
        self.current.store(Some(work));
    }

    /// Withdraw the published work (shutdown path).
    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn snapshot(&self) -> Option<Arc<Work>> {
        self.current.load_full()
    }

    /// Generation of the published work, 0 when the board is empty.
    pub fn generation(&self) -> u64 {
        self.current.load().as_ref().map(|w| w.generation).unwrap_or(0)
    }

    pub fn has_work(&self) -> bool {
        self.current.load().is_some()
    }
}

impl Default for WorkBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker needs from the manager: where to read work from and
/// where to report solutions. Cloned into each spawned worker thread. Also
/// the injection point for synthetic workers in tests and benchmarks.
#[derive(Clone)]
pub struct WorkerContext {
    pub board: Arc<WorkBoard>,
    pub solutions: Sender<Solution>,
}

/// Capability set shared by CPU and GPU workers. The manager aggregates,
/// restarts and shuts down through this trait without caring which kind of
/// compute sits behind it.
pub trait MiningWorker: Send {
    /// Stable identifier, e.g. "cpu-3" or "gpu".
    fn label(&self) -> &str;

    /// Handle to this worker's counters; the manager drains the interval
    /// counter from here during update.
    fn stats(&self) -> Arc<WorkerStats>;

    /// Whether the backing thread is still running. A false return is how
    /// the manager discovers a crashed worker on its next poll.
    fn is_alive(&self) -> bool;

    /// Cooperative stop signal, observed between hash batches.
    fn stop(&self);

    /// Wait for the backing thread to reach its clean stopping point.
    fn join(&mut self);

    /// Respawn the backing thread after a crash.
    fn restart(&mut self, ctx: &WorkerContext) -> Result<()>;
}
