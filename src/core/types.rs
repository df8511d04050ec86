// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/core/types.rs
//
// Core data structures: a unit of mining work, a found solution, the manager
// configuration, and the CLI arguments. Work is immutable once published; a
// new generation fully replaces the old one, it is never edited in place.
//
// Tree Location:
// - src/core/types.rs (core data structures)
// - Depends on: clap, serde

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::utils::error::{MinerError, Result};

/// Byte length of a block header template. The nonce occupies the final four
/// bytes and is rewritten by workers for every attempt.
pub const HEADER_LEN: usize = 80;

/// One unit of mining input, distributed read-only to every worker.
///
/// The generation tag is assigned by the manager when the work is published
/// and is strictly increasing across publications. Workers stamp it onto the
/// solutions they report so stale results can be discarded after a swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    /// 80-byte header template; bytes 76..80 are the nonce slot.
    pub header: Vec<u8>,
    /// Minimum difficulty a hash must reach to count as a solution.
    pub target_difficulty: u64,
    /// First nonce of the search space.
    pub nonce_start: u32,
    /// One past the last nonce of the search space.
    pub nonce_end: u32,
    /// Monotonic publication tag, 0 until the manager publishes the work.
    pub generation: u64,
}

impl Work {
    pub fn new(header: Vec<u8>, target_difficulty: u64, nonce_start: u32, nonce_end: u32) -> Self {
        Self {
            header,
            target_difficulty,
            nonce_start,
            nonce_end,
            generation: 0,
        }
    }

    /// Build work from a compact nbits target encoding instead of a u64
    /// difficulty, as pool-issued headers carry it.
    pub fn from_nbits(header: Vec<u8>, bits: u32, nonce_start: u32, nonce_end: u32) -> Self {
        let target = crate::core::difficulty::bits_to_target(bits);
        let difficulty = crate::core::difficulty::target_to_difficulty(target);
        Self::new(header, difficulty, nonce_start, nonce_end)
    }

    /// Number of nonces in the search space.
    pub fn nonce_span(&self) -> u32 {
        self.nonce_end.saturating_sub(self.nonce_start)
    }

    /// StartWork precondition check. Rejected work is surfaced to the caller,
    /// never silently dropped.
    pub fn validate(&self) -> Result<()> {
        if self.header.len() != HEADER_LEN {
            return Err(MinerError::InvalidWork(format!(
                "header is {} bytes, expected {}",
                self.header.len(),
                HEADER_LEN
            )));
        }
        if self.target_difficulty == 0 {
            return Err(MinerError::InvalidWork("target difficulty is zero".to_string()));
        }
        if self.nonce_span() == 0 {
            return Err(MinerError::InvalidWork("empty nonce search space".to_string()));
        }
        Ok(())
    }
}

/// A qualifying hash found by a worker, waiting in the manager's queue until
/// the next update drains it toward the connection.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Generation of the work the solution was found against.
    pub generation: u64,
    pub nonce: u32,
    pub hash: [u8; 32],
    pub difficulty: u64,
    /// Label of the worker that found it, e.g. "cpu-3" or "gpu".
    pub worker: String,
}

/// Construction parameters for the mining thread manager.
///
/// `gpu_percentage` is a capacity share in [0.0, 1.0]: CPU workers hash
/// `(1 - p)` of their base batch per dispatch and the GPU worker `p` of its
/// base batch. 0.0 parks the GPU thread, 1.0 parks the CPU threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Number of CPU work threads. 0 disables CPU mining entirely.
    pub thread_count: usize,
    /// Select the 4-wide batch hashing path in every CPU worker.
    pub use_sse: bool,
    /// Fraction of total hashing capacity assigned to the GPU worker.
    pub gpu_percentage: f64,
    /// Base nonces per CPU dispatch, before the capacity split is applied.
    pub cpu_batch_size: u32,
    /// Base nonces per GPU dispatch, before the capacity split is applied.
    pub gpu_batch_size: u32,
    /// Times a crashed worker slot is respawned before it is given up on.
    pub restart_budget: u32,
}

impl ManagerConfig {
    pub fn new(thread_count: usize, use_sse: bool, gpu_percentage: f64) -> Self {
        Self {
            thread_count,
            use_sse,
            gpu_percentage,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gpu_percentage.is_finite() || !(0.0..=1.0).contains(&self.gpu_percentage) {
            return Err(MinerError::InvalidConfig(format!(
                "gpu_percentage {} outside [0.0, 1.0]",
                self.gpu_percentage
            )));
        }
        if self.cpu_batch_size == 0 || self.gpu_batch_size == 0 {
            return Err(MinerError::InvalidConfig("batch sizes must be nonzero".to_string()));
        }
        Ok(())
    }

    /// Nonces a CPU worker hashes per dispatch under the capacity split.
    pub fn effective_cpu_batch(&self) -> u32 {
        ((1.0 - self.gpu_percentage) * self.cpu_batch_size as f64).round() as u32
    }

    /// Nonces the GPU worker dispatches per kernel launch under the split.
    pub fn effective_gpu_batch(&self) -> u32 {
        (self.gpu_percentage * self.gpu_batch_size as f64).round() as u32
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            thread_count: 0,
            use_sse: true,
            gpu_percentage: 0.0,
            cpu_batch_size: 1000,
            gpu_batch_size: 200_000,
            restart_budget: 2,
        }
    }
}

/// Command-line arguments for the forgemine binary
#[derive(Parser, Debug)]
#[command(
    name = "forgemine",
    version,
    about = "CPU/GPU mining thread manager with live hash-rate reporting",
    long_about = "Forgemine coordinates a pool of CPU work threads and an optional GPU thread,\n\
                  splits hashing capacity between them, and reports aggregate throughput on a\n\
                  poll cadence. Without a pool it runs against a loopback connection that\n\
                  synthesizes work at a fixed difficulty, which makes it usable as a benchmark.\n\n\
                  Examples:\n\
                    CPU only:   forgemine --threads 8 --difficulty 100000 --duration 60\n\
                    Hybrid:     forgemine --threads 4 --gpu-percentage 0.5\n\
                    Scalar path: forgemine --no-sse --threads 2"
)]
pub struct Args {
    /// Number of CPU mining threads (0 = one per core)
    #[arg(
        short,
        long,
        default_value = "0",
        value_name = "COUNT",
        help = "Number of CPU threads (0 = one per core)"
    )]
    pub threads: usize,

    /// Disable the 4-wide batch hashing path and hash one nonce at a time
    #[arg(long, default_value = "false", help = "Disable the batch (SSE) hashing path")]
    pub no_sse: bool,

    /// Fraction of hashing capacity assigned to the GPU worker
    #[arg(
        short = 'g',
        long,
        default_value = "0.0",
        value_name = "FRACTION",
        help = "GPU capacity share in [0.0, 1.0]"
    )]
    pub gpu_percentage: f64,

    /// Difficulty of the synthesized loopback work
    #[arg(
        short,
        long,
        default_value = "100000",
        value_name = "DIFFICULTY",
        help = "Target difficulty for loopback work"
    )]
    pub difficulty: u64,

    /// How long to run before printing the summary, in seconds
    #[arg(long, default_value = "30", value_name = "SECONDS", help = "Run duration in seconds")]
    pub duration: u64,

    /// Poll interval between manager updates, in milliseconds
    #[arg(long, default_value = "1000", value_name = "MS", help = "Update poll interval")]
    pub poll_ms: u64,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if !self.gpu_percentage.is_finite() || !(0.0..=1.0).contains(&self.gpu_percentage) {
            return Err(MinerError::InvalidConfig(format!(
                "--gpu-percentage {} outside [0.0, 1.0]",
                self.gpu_percentage
            )));
        }
        if self.poll_ms == 0 {
            return Err(MinerError::InvalidConfig("--poll-ms must be nonzero".to_string()));
        }
        if self.difficulty == 0 {
            return Err(MinerError::InvalidConfig("--difficulty must be nonzero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_nbits_sets_the_difficulty_scale() {
        // Genesis-block compact target: 0xFFFF << 208, i.e. difficulty
        // 2^32 + 2^16 + 1 on the u64 scale.
        let work = Work::from_nbits(vec![0u8; HEADER_LEN], 0x1d00ffff, 0, u32::MAX);
        assert_eq!(work.target_difficulty, 4_295_032_833);
        assert!(work.validate().is_ok());
    }

    #[test]
    fn from_nbits_with_invalid_bits_is_unreachable_difficulty() {
        // A zero mantissa decodes to a zero target, which no hash can meet.
        let work = Work::from_nbits(vec![0u8; HEADER_LEN], 0x1d000000, 0, u32::MAX);
        assert_eq!(work.target_difficulty, u64::MAX);
    }

    #[test]
    fn work_validation_rejects_bad_inputs() {
        assert!(Work::new(vec![0u8; 10], 1000, 0, u32::MAX).validate().is_err());
        assert!(Work::new(vec![0u8; HEADER_LEN], 0, 0, u32::MAX).validate().is_err());
        assert!(Work::new(vec![0u8; HEADER_LEN], 1000, 7, 7).validate().is_err());
        assert!(Work::new(vec![0u8; HEADER_LEN], 1000, 0, u32::MAX).validate().is_ok());
    }
}
