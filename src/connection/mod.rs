// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/connection/mod.rs
//
// Work source abstraction. The manager pulls work from and submits solutions
// to a `MinerConnection`; the loopback implementation synthesizes work
// locally so the miner runs (and benchmarks) without any pool.

pub mod loopback;

pub use loopback::LoopbackConnection;

use crate::core::types::{Solution, Work};
use crate::utils::error::Result;

/// Where work comes from and where solutions go. Implemented by the loopback
/// generator here and by pool clients elsewhere.
pub trait MinerConnection {
    /// Produce the next unit of work, or `None` when the source has nothing
    /// new to hand out yet.
    fn fetch_work(&mut self) -> Result<Option<Work>>;

    /// Deliver a drained solution. Stale-generation solutions never reach
    /// this point; the manager discards them first.
    fn submit_solution(&mut self, solution: &Solution) -> Result<()>;

    /// Whether this connection has issued work that is still current. The
    /// manager refreshes the work board when this goes false.
    fn has_issued_work(&self) -> bool;
}
