// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/manager.rs
//
// The mining thread manager. Owns the CPU worker pool and the GPU worker,
// publishes work generations to them through the work board, and on every
// update drains their hash counters into one aggregate hashes-per-second
// figure, routes found solutions to the connection, and keeps the board fed
// with fresh work. All worker interaction is lock-free: counters are atomics
// drained by swap, work distribution is a pointer swap, solutions arrive over
// a channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver};
use log::{debug, error, info, warn};

use crate::connection::MinerConnection;
use crate::core::types::{ManagerConfig, Solution, Work};
use crate::miner::cpu::CpuWorker;
use crate::miner::gpu::GpuWorker;
use crate::miner::stats::WorkerStats;
use crate::miner::timer::Timer;
use crate::miner::worker::{MiningWorker, WorkBoard, WorkerContext};
use crate::utils::error::{MinerError, Result};
use crate::utils::format::FormatUtils;

const LOG_TARGET: &str = "forgemine::manager";

/// Times a CPU slot's thread creation is attempted before the slot is given
/// up on and the pool continues at reduced capacity.
const SPAWN_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Running,
    Stopped,
}

/// One owned worker plus its crash bookkeeping.
struct WorkerSlot {
    worker: Box<dyn MiningWorker>,
    restarts_left: u32,
    /// Set when the worker crashed and its restart budget ran out; the slot
    /// is excluded from aggregation from then on.
    dead: bool,
}

pub struct MiningThreadManager {
    config: ManagerConfig,
    board: Arc<WorkBoard>,
    ctx: WorkerContext,
    solutions: Receiver<Solution>,
    slots: Vec<WorkerSlot>,
    timer: Timer,
    /// Last generation tag handed out; the next published work gets this + 1.
    generation: AtomicU64,
    /// Aggregate hashes/second, written only during update.
    hash_rate: AtomicU64,
    state: ManagerState,
    cpu_worker_count: usize,
    degraded: bool,
}

impl MiningThreadManager {
    /// Spawn the worker pool: `thread_count` CPU workers plus one GPU worker.
    ///
    /// A missing or unusable GPU device does not fail construction; the GPU
    /// worker parks and the manager reports degraded CPU-only operation. A
    /// CPU slot whose thread cannot be spawned is skipped with a logged
    /// error, so a partially spawned pool still mines.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        let board = Arc::new(WorkBoard::new());
        let (solution_tx, solution_rx) = unbounded();
        let ctx = WorkerContext {
            board: Arc::clone(&board),
            solutions: solution_tx,
        };

        let mut slots: Vec<WorkerSlot> = Vec::with_capacity(config.thread_count + 1);
        let mut cpu_worker_count = 0;
        for thread_id in 0..config.thread_count {
            match spawn_cpu_slot(thread_id, &config, &ctx) {
                Some(worker) => {
                    cpu_worker_count += 1;
                    slots.push(WorkerSlot {
                        worker: Box::new(worker),
                        restarts_left: config.restart_budget,
                        dead: false,
                    });
                }
                None => {
                    error!(target: LOG_TARGET,
                        "cpu slot {} not spawned after {} attempt(s), continuing with reduced capacity",
                        thread_id, SPAWN_ATTEMPTS);
                }
            }
        }

        let gpu = GpuWorker::spawn(&config, &ctx)?;
        let gpu_requested = config.gpu_percentage > 0.0;
        let degraded = gpu_requested && !gpu.device_available();
        if degraded {
            warn!(target: LOG_TARGET,
                "no usable GPU device, running degraded CPU-only at {:.0}% capacity",
                (1.0 - config.gpu_percentage) * 100.0);
        }
        slots.push(WorkerSlot {
            worker: Box::new(gpu),
            restarts_left: config.restart_budget,
            dead: false,
        });

        info!(target: LOG_TARGET,
            "manager started: {} cpu worker(s), gpu {} (capacity share {:.2})",
            cpu_worker_count,
            if degraded || !gpu_requested { "parked" } else { "active" },
            config.gpu_percentage);

        Ok(Self {
            config,
            board,
            ctx,
            solutions: solution_rx,
            slots,
            timer: Timer::new(),
            generation: AtomicU64::new(0),
            hash_rate: AtomicU64::new(0),
            state: ManagerState::Running,
            cpu_worker_count,
            degraded,
        })
    }

    /// Construction with caller-supplied workers instead of the real pool.
    /// Used by tests and benchmark harnesses to drive the manager with
    /// synthetic compute.
    pub fn with_workers<F>(config: ManagerConfig, factory: F) -> Result<Self>
    where
        F: FnOnce(&WorkerContext) -> Vec<Box<dyn MiningWorker>>,
    {
        config.validate()?;

        let board = Arc::new(WorkBoard::new());
        let (solution_tx, solution_rx) = unbounded();
        let ctx = WorkerContext {
            board: Arc::clone(&board),
            solutions: solution_tx,
        };

        let workers = factory(&ctx);
        let cpu_worker_count = workers.len();
        let slots = workers
            .into_iter()
            .map(|worker| WorkerSlot {
                worker,
                restarts_left: config.restart_budget,
                dead: false,
            })
            .collect();

        Ok(Self {
            config,
            board,
            ctx,
            solutions: solution_rx,
            slots,
            timer: Timer::new(),
            generation: AtomicU64::new(0),
            hash_rate: AtomicU64::new(0),
            state: ManagerState::Running,
            cpu_worker_count,
            degraded: false,
        })
    }

    /// Validate and publish a unit of work, replacing the current generation.
    ///
    /// Workers pick the new generation up at their next batch edge; solutions
    /// still in flight against the old generation are discarded by the next
    /// update.
    pub fn start_work(&self, mut work: Work) -> Result<()> {
        if self.state != ManagerState::Running {
            return Err(MinerError::Stopped);
        }
        work.validate()?;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        work.generation = generation;
        debug!(target: LOG_TARGET,
            "publishing generation {} (difficulty {}, nonce span {})",
            generation, work.target_difficulty, work.nonce_span());
        self.board.publish(Arc::new(work));
        Ok(())
    }

    /// One poll-cadence tick: refresh the aggregate hash rate, restart or
    /// retire crashed workers, route drained solutions to the connection,
    /// and keep the work board fed.
    pub fn update(&mut self, conn: &mut dyn MinerConnection) -> Result<()> {
        if self.state != ManagerState::Running {
            return Err(MinerError::Stopped);
        }

        let elapsed = self.timer.lap();
        self.poll_workers(elapsed.as_secs_f64());
        self.drain_solutions(conn)?;
        self.replenish_work(conn)?;
        Ok(())
    }

    /// Aggregate hashes/second measured over the last update interval.
    /// Reads 0 before the first update.
    pub fn hash_rate(&self) -> u64 {
        self.hash_rate.load(Ordering::Relaxed)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// CPU worker slots that were actually spawned.
    pub fn cpu_worker_count(&self) -> usize {
        self.cpu_worker_count
    }

    /// Workers that crashed and exhausted their restart budget.
    pub fn lost_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.dead).count()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn has_work(&self) -> bool {
        self.board.has_work()
    }

    /// Stats handles for every slot, for end-of-run reporting.
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.slots.iter().map(|s| s.worker.stats()).collect()
    }

    /// Stop every worker, wait for each to reach its batch edge, and withdraw
    /// the published work. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.state == ManagerState::Stopped {
            return;
        }
        self.state = ManagerState::Stopped;

        info!(target: LOG_TARGET, "shutting down {} worker(s)", self.slots.len());
        for slot in &self.slots {
            slot.worker.stop();
        }
        for slot in &mut self.slots {
            slot.worker.join();
        }
        self.board.clear();
        self.hash_rate.store(0, Ordering::Relaxed);

        let total: u64 = self.slots.iter().map(|s| s.worker.stats().lifetime_hashes()).sum();
        info!(target: LOG_TARGET,
            "shutdown complete after {}: {} hashes total",
            FormatUtils::format_duration(self.timer.elapsed()),
            FormatUtils::format_number(total));
    }

    /// Drain per-worker interval counters into the aggregate rate and handle
    /// crashed workers within the restart budget.
    fn poll_workers(&mut self, interval_secs: f64) {
        let mut interval_hashes = 0u64;
        for slot in &mut self.slots {
            if slot.dead {
                continue;
            }

            if !slot.worker.is_alive() {
                // Discard whatever the crashed thread counted; a partial
                // interval from a dead worker would skew the rate.
                let _ = slot.worker.stats().take_interval();
                if slot.restarts_left > 0 {
                    slot.restarts_left -= 1;
                    warn!(target: LOG_TARGET,
                        "{} crashed, restarting ({} restart(s) left)",
                        slot.worker.label(), slot.restarts_left);
                    if let Err(e) = slot.worker.restart(&self.ctx) {
                        error!(target: LOG_TARGET, "{} restart failed: {}", slot.worker.label(), e);
                        slot.dead = true;
                    }
                } else {
                    error!(target: LOG_TARGET,
                        "{} crashed with no restart budget left, retiring the slot",
                        slot.worker.label());
                    slot.dead = true;
                }
                continue;
            }

            let hashes = slot.worker.stats().take_interval();
            interval_hashes += hashes;
            if interval_secs > 0.0 {
                slot.worker.stats().note_rate((hashes as f64 / interval_secs) as u64);
            }
        }

        let rate = if interval_secs > 0.0 {
            (interval_hashes as f64 / interval_secs) as u64
        } else {
            0
        };
        self.hash_rate.store(rate, Ordering::Relaxed);
    }

    /// Route queued solutions to the connection, dropping any found against a
    /// superseded generation.
    fn drain_solutions(&mut self, conn: &mut dyn MinerConnection) -> Result<()> {
        let current = self.board.generation();
        while let Ok(solution) = self.solutions.try_recv() {
            if solution.generation != current {
                debug!(target: LOG_TARGET,
                    "dropping stale solution from {} (generation {} != {})",
                    solution.worker, solution.generation, current);
                continue;
            }
            conn.submit_solution(&solution)?;
        }
        Ok(())
    }

    /// Fetch and publish new work when the board is empty or the connection
    /// has retired its outstanding template.
    fn replenish_work(&mut self, conn: &mut dyn MinerConnection) -> Result<()> {
        if self.board.has_work() && conn.has_issued_work() {
            return Ok(());
        }
        if let Some(work) = conn.fetch_work()? {
            self.start_work(work)?;
        }
        Ok(())
    }
}

impl Drop for MiningThreadManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bounded-retry thread creation for one CPU slot.
fn spawn_cpu_slot(thread_id: usize, config: &ManagerConfig, ctx: &WorkerContext) -> Option<CpuWorker> {
    for attempt in 1..=SPAWN_ATTEMPTS {
        match CpuWorker::spawn(thread_id, config.thread_count, config, ctx) {
            Ok(worker) => return Some(worker),
            Err(e) => {
                warn!(target: LOG_TARGET,
                    "cpu slot {} spawn attempt {}/{} failed: {}",
                    thread_id, attempt, SPAWN_ATTEMPTS, e);
            }
        }
    }
    None
}
