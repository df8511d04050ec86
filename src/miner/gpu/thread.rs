// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/gpu/thread.rs
//
// GPU worker. Same contract as a CPU work thread, but each dispatch hands a
// batch of nonces to the OpenCL engine sized by the configured GPU capacity
// share. When no usable device exists (or the crate is built without the
// `gpu` feature) the worker parks: it stays alive and responsive to stop and
// contributes zero hashes, and the manager reports degraded CPU-only mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::core::types::ManagerConfig;
use crate::miner::stats::WorkerStats;
use crate::miner::worker::{MiningWorker, WorkerContext};
use crate::utils::error::{MinerError, Result};

const LOG_TARGET: &str = "forgemine::gpu";

const IDLE_WAIT: Duration = Duration::from_millis(10);

#[derive(Clone)]
struct GpuParams {
    /// Nonces per kernel dispatch after the capacity split; 0 parks the
    /// worker.
    batch_size: u32,
}

/// Handle to the single GPU worker, owned by the manager.
pub struct GpuWorker {
    label: String,
    params: GpuParams,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    device_available: bool,
}

impl GpuWorker {
    pub fn spawn(config: &ManagerConfig, ctx: &WorkerContext) -> Result<Self> {
        let label = "gpu".to_string();
        let params = GpuParams {
            batch_size: config.effective_gpu_batch(),
        };
        let device_available = device_available();
        let stats = Arc::new(WorkerStats::new(label.clone()));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = launch(
            &label,
            params.clone(),
            device_available,
            ctx.clone(),
            Arc::clone(&stats),
            Arc::clone(&stop),
        )?;
        Ok(Self {
            label,
            params,
            stats,
            stop,
            handle: Some(handle),
            device_available,
        })
    }

    /// Whether a usable GPU device was found at construction. False means
    /// this worker is parked and the manager runs degraded CPU-only.
    pub fn device_available(&self) -> bool {
        self.device_available
    }
}

impl MiningWorker for GpuWorker {
    fn label(&self) -> &str {
        &self.label
    }

    fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    fn is_alive(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn restart(&mut self, ctx: &WorkerContext) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.stop = Arc::new(AtomicBool::new(false));
        let handle = launch(
            &self.label,
            self.params.clone(),
            self.device_available,
            ctx.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.stop),
        )?;
        self.handle = Some(handle);
        Ok(())
    }
}

/// Probe for a usable device without holding any OpenCL state.
fn device_available() -> bool {
    #[cfg(feature = "gpu")]
    {
        super::opencl::OpenClDevice::best_device().is_ok()
    }
    #[cfg(not(feature = "gpu"))]
    {
        false
    }
}

fn launch(
    label: &str,
    params: GpuParams,
    device_available: bool,
    ctx: WorkerContext,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let thread_label = label.to_string();
    thread::Builder::new()
        .name(thread_label.clone())
        .spawn(move || {
            run(&thread_label, params, device_available, ctx, stats, stop);
            debug!(target: LOG_TARGET, "{} stopped", thread_label);
        })
        .map_err(|source| MinerError::WorkerSpawn {
            slot: label.to_string(),
            source,
        })
}

#[cfg(feature = "gpu")]
fn run(
    label: &str,
    params: GpuParams,
    device_available: bool,
    ctx: WorkerContext,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) {
    if device_available && params.batch_size > 0 {
        mine_loop(label, params, ctx, stats, stop);
    } else {
        debug!(target: LOG_TARGET,
            "{} parked (device available: {}, batch {})",
            label, device_available, params.batch_size);
        park_loop(&stop);
    }
}

#[cfg(not(feature = "gpu"))]
fn run(
    label: &str,
    params: GpuParams,
    _device_available: bool,
    _ctx: WorkerContext,
    _stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) {
    debug!(target: LOG_TARGET,
        "{} parked (built without GPU support, batch {})", label, params.batch_size);
    park_loop(&stop);
}

/// Zero-capacity loop: stay alive and responsive to the stop signal.
fn park_loop(stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(IDLE_WAIT);
    }
}

#[cfg(feature = "gpu")]
fn mine_loop(
    label: &str,
    params: GpuParams,
    ctx: WorkerContext,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) {
    use log::{error, info, trace};

    use crate::core::difficulty::calculate_difficulty;
    use crate::core::sha256d::sha256d_hash_with_nonce;
    use crate::core::types::Solution;
    use super::opencl::{OpenClDevice, Sha256dEngine};

    // OpenCL state is created on the worker thread and never crosses it.
    let device = match OpenClDevice::best_device() {
        Ok(device) => device,
        Err(e) => {
            error!(target: LOG_TARGET, "{} lost its device: {}", label, e);
            park_loop(&stop);
            return;
        }
    };
    let mut engine = match Sha256dEngine::new(device) {
        Ok(engine) => engine,
        Err(e) => {
            error!(target: LOG_TARGET, "{} engine init failed: {}", label, e);
            park_loop(&stop);
            return;
        }
    };
    info!(target: LOG_TARGET, "{} mining on {} (batch {})", label, engine.device_name(), params.batch_size);

    let mut current_generation = 0u64;
    let mut nonce = 0u32;

    while !stop.load(Ordering::Relaxed) {
        let Some(work) = ctx.board.snapshot() else {
            thread::sleep(IDLE_WAIT);
            continue;
        };

        if work.generation != current_generation {
            current_generation = work.generation;
            nonce = work.nonce_start;
        }

        match engine.mine(&work, nonce, params.batch_size) {
            Ok((found, hashes_done)) => {
                stats.add_hashes(hashes_done as u64);
                if let Some(found_nonce) = found {
                    // Re-hash on the CPU so the reported solution is engine
                    // independent.
                    let hash = sha256d_hash_with_nonce(&work.header, found_nonce);
                    let difficulty = calculate_difficulty(&hash);
                    if difficulty >= work.target_difficulty {
                        stats.record_solution();
                        trace!(target: LOG_TARGET,
                            "{} found solution: nonce {:08x}, difficulty {}",
                            label, found_nonce, difficulty);
                        let _ = ctx.solutions.send(Solution {
                            generation: work.generation,
                            nonce: found_nonce,
                            hash,
                            difficulty,
                            worker: label.to_string(),
                        });
                    }
                }
                nonce = nonce.wrapping_add(hashes_done);
                if nonce >= work.nonce_end || nonce < work.nonce_start {
                    nonce = work.nonce_start;
                }
            }
            Err(e) => {
                error!(target: LOG_TARGET, "{} dispatch failed: {}", label, e);
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}
