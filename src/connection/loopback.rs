// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/connection/loopback.rs
//
// Pool-free work source. Synthesizes random header templates at a fixed
// difficulty and verifies submissions locally, which makes the full
// manager/worker pipeline runnable as a standalone benchmark.

use log::{debug, info};
use rand::RngCore;

use crate::core::difficulty::calculate_difficulty;
use crate::core::types::{Solution, Work, HEADER_LEN};
use crate::utils::error::Result;

use super::MinerConnection;

const LOG_TARGET: &str = "forgemine::loopback";

pub struct LoopbackConnection {
    difficulty: u64,
    issued: u64,
    accepted: u64,
    rejected: u64,
    best_difficulty: u64,
    /// Issue one header and keep it current; a fresh template is synthesized
    /// after each accepted solution.
    outstanding: bool,
}

impl LoopbackConnection {
    pub fn new(difficulty: u64) -> Self {
        Self {
            difficulty,
            issued: 0,
            accepted: 0,
            rejected: 0,
            best_difficulty: 0,
            outstanding: false,
        }
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn best_difficulty(&self) -> u64 {
        self.best_difficulty
    }
}

impl MinerConnection for LoopbackConnection {
    fn fetch_work(&mut self) -> Result<Option<Work>> {
        if self.outstanding {
            return Ok(None);
        }
        let mut header = vec![0u8; HEADER_LEN];
        rand::thread_rng().fill_bytes(&mut header[..76]);
        self.issued += 1;
        self.outstanding = true;
        debug!(target: LOG_TARGET, "issued work template #{} at difficulty {}", self.issued, self.difficulty);
        Ok(Some(Work::new(header, self.difficulty, 0, u32::MAX)))
    }

    fn submit_solution(&mut self, solution: &Solution) -> Result<()> {
        // Verify against the hash itself, not the difficulty the worker
        // computed for it.
        if calculate_difficulty(&solution.hash) >= self.difficulty {
            self.accepted += 1;
            if solution.difficulty > self.best_difficulty {
                self.best_difficulty = solution.difficulty;
            }
            // Retire the current template so the next fetch issues new work.
            self.outstanding = false;
            info!(target: LOG_TARGET,
                "accepted solution from {}: nonce {:08x}, difficulty {}",
                solution.worker, solution.nonce, solution.difficulty);
        } else {
            self.rejected += 1;
            debug!(target: LOG_TARGET,
                "rejected solution from {}: difficulty {} below {}",
                solution.worker, solution.difficulty, self.difficulty);
        }
        Ok(())
    }

    fn has_issued_work(&self) -> bool {
        self.outstanding
    }
}
