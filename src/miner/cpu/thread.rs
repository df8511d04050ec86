// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/cpu/thread.rs
//
// CPU work thread. Runs a bounded-batch hashing loop against the current
// work generation: the stop signal and generation swaps are observed between
// batches, never mid-batch, so the hot path takes no locks. Qualifying hashes
// are reported through the solution channel tagged with the generation they
// were found against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace};

use crate::core::difficulty::calculate_difficulty;
use crate::core::sha256d::{sha256d_hash_with_nonce, sha256d_hash_with_nonce_batch};
use crate::core::types::{ManagerConfig, Solution, Work};
use crate::miner::stats::WorkerStats;
use crate::miner::worker::{MiningWorker, WorkerContext};
use crate::utils::error::{MinerError, Result};

const LOG_TARGET: &str = "forgemine::cpu";

/// Sleep between stop-checks while no work is published or the worker's
/// capacity share is zero.
const IDLE_WAIT: Duration = Duration::from_millis(10);

#[derive(Clone)]
struct CpuParams {
    thread_id: usize,
    /// Total CPU workers; nonce cursors stride by this so workers cover
    /// disjoint nonces.
    num_threads: usize,
    /// Nonces per dispatch after the gpu/cpu capacity split; 0 parks the
    /// worker.
    batch_size: u32,
    use_sse: bool,
}

/// Handle to one CPU work thread, owned by the manager.
pub struct CpuWorker {
    label: String,
    params: CpuParams,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CpuWorker {
    pub fn spawn(
        thread_id: usize,
        num_threads: usize,
        config: &ManagerConfig,
        ctx: &WorkerContext,
    ) -> Result<Self> {
        let label = format!("cpu-{}", thread_id);
        let params = CpuParams {
            thread_id,
            num_threads: num_threads.max(1),
            batch_size: config.effective_cpu_batch(),
            use_sse: config.use_sse,
        };
        let stats = Arc::new(WorkerStats::new(label.clone()));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = launch(&label, params.clone(), ctx.clone(), Arc::clone(&stats), Arc::clone(&stop))?;
        Ok(Self {
            label,
            params,
            stats,
            stop,
            handle: Some(handle),
        })
    }
}

impl MiningWorker for CpuWorker {
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
            ctx.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.stop),
        )?;
        self.handle = Some(handle);
        Ok(())
    }
}

fn launch(
    label: &str,
    params: CpuParams,
    ctx: WorkerContext,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let thread_label = label.to_string();
    thread::Builder::new()
        .name(thread_label.clone())
        .spawn(move || {
            debug!(target: LOG_TARGET, "{} starting (batch {}, sse {})", thread_label, params.batch_size, params.use_sse);
            work_loop(&thread_label, params, ctx, stats, stop);
            debug!(target: LOG_TARGET, "{} stopped", thread_label);
        })
        .map_err(|source| MinerError::WorkerSpawn {
            slot: label.to_string(),
            source,
        })
}

fn work_loop(
    label: &str,
    params: CpuParams,
    ctx: WorkerContext,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
) {
    let mut current_generation = 0u64;
    let mut nonce = 0u32;

    while !stop.load(Ordering::Relaxed) {
        let Some(work) = ctx.board.snapshot() else {
            thread::sleep(IDLE_WAIT);
            continue;
        };

        if work.generation != current_generation {
            current_generation = work.generation;
            nonce = generation_start(&work, &params);
            trace!(target: LOG_TARGET, "{} picked up generation {}", label, current_generation);
        }

        if params.batch_size == 0 {
            // All capacity assigned to the GPU; stay parked but responsive.
            thread::sleep(IDLE_WAIT);
            continue;
        }

        nonce = hash_batch(label, &params, &work, nonce, &ctx, &stats);
    }
}

/// This worker's fixed offset from the shared base. One nonce per worker on
/// the scalar path, one 4-nonce lane per worker on the batch path.
fn lane_offset(params: &CpuParams) -> u32 {
    if params.use_sse {
        (4 * params.thread_id) as u32
    } else {
        params.thread_id as u32
    }
}

/// Starting cursor for a new generation. Every worker derives the same base
/// from the header, then adds its own lane offset, so under the batch stride
/// each worker owns a distinct residue class and no nonce is hashed twice.
fn generation_start(work: &Work, params: &CpuParams) -> u32 {
    let span = work.nonce_span().max(1);
    let base = u32::from_le_bytes([
        work.header[0],
        work.header[1],
        work.header[2],
        work.header[3],
    ]) % span;
    work.nonce_start
        .wrapping_add(base)
        .wrapping_add(lane_offset(params))
}

/// Hash one bounded batch, report solutions, return the advanced cursor.
fn hash_batch(
    label: &str,
    params: &CpuParams,
    work: &Arc<Work>,
    mut nonce: u32,
    ctx: &WorkerContext,
    stats: &WorkerStats,
) -> u32 {
    let mut hashed = 0u64;

    if params.use_sse {
        let stride = (4 * params.num_threads) as u32;
        for _ in (0..params.batch_size).step_by(4) {
            let batch = sha256d_hash_with_nonce_batch(&work.header, nonce);
            for (hash, batch_nonce) in batch.iter() {
                hashed += 1;
                report_if_solution(label, work, hash, *batch_nonce, ctx, stats);
            }
            nonce = nonce.wrapping_add(stride);
        }
    } else {
        let stride = params.num_threads as u32;
        for _ in 0..params.batch_size {
            let hash = sha256d_hash_with_nonce(&work.header, nonce);
            hashed += 1;
            report_if_solution(label, work, &hash, nonce, ctx, stats);
            nonce = nonce.wrapping_add(stride);
        }
    }

    stats.add_hashes(hashed);

    // Wrap back to the start of the search space without leaving this
    // worker's residue class.
    if nonce >= work.nonce_end || nonce < work.nonce_start {
        nonce = work.nonce_start.wrapping_add(lane_offset(params));
    }
    nonce
}

fn report_if_solution(
    label: &str,
    work: &Work,
    hash: &[u8; 32],
    nonce: u32,
    ctx: &WorkerContext,
    stats: &WorkerStats,
) {
    let difficulty = calculate_difficulty(hash);
    if difficulty >= work.target_difficulty {
        stats.record_solution();
        trace!(target: LOG_TARGET,
            "{} found solution: nonce {:08x}, difficulty {}", label, nonce, difficulty);
        // A send error means the manager is gone; the stop flag will follow.
        let _ = ctx.solutions.send(Solution {
            generation: work.generation,
            nonce,
            hash: *hash,
            difficulty,
            worker: label.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::core::types::HEADER_LEN;

    fn params(thread_id: usize, num_threads: usize, use_sse: bool) -> CpuParams {
        CpuParams {
            thread_id,
            num_threads,
            batch_size: 1000,
            use_sse,
        }
    }

    fn work_with_seed(seed: u8) -> Work {
        let mut header = vec![0u8; HEADER_LEN];
        header[0] = seed;
        header[3] = seed.wrapping_mul(31);
        Work::new(header, 1000, 0, u32::MAX)
    }

    #[test]
    fn scalar_workers_own_disjoint_residue_classes() {
        let num_threads = 4usize;
        for seed in [0u8, 1, 17, 255] {
            let work = work_with_seed(seed);
            let residues: HashSet<u32> = (0..num_threads)
                .map(|i| generation_start(&work, &params(i, num_threads, false)) % num_threads as u32)
                .collect();
            assert_eq!(residues.len(), num_threads, "seed {}", seed);
        }
    }

    #[test]
    fn batch_workers_own_disjoint_lanes() {
        let num_threads = 3usize;
        let stride = 4 * num_threads as u32;
        for seed in [0u8, 42, 200] {
            let work = work_with_seed(seed);
            let mut residues = HashSet::new();
            for i in 0..num_threads {
                let start = generation_start(&work, &params(i, num_threads, true));
                // Each batch iteration hashes four consecutive nonces.
                for lane in 0..4u32 {
                    residues.insert(start.wrapping_add(lane) % stride);
                }
            }
            assert_eq!(residues.len(), 4 * num_threads, "seed {}", seed);
        }
    }

    #[test]
    fn workers_agree_on_the_generation_base() {
        let work = work_with_seed(9);
        let num_threads = 4usize;
        let base = generation_start(&work, &params(0, num_threads, false));
        for i in 1..num_threads {
            let start = generation_start(&work, &params(i, num_threads, false));
            assert_eq!(start.wrapping_sub(base), i as u32);
        }
    }

    #[test]
    fn wrap_preserves_the_lane_offset() {
        assert_eq!(lane_offset(&params(2, 4, false)), 2);
        assert_eq!(lane_offset(&params(2, 4, true)), 8);
    }
}
