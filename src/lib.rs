// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/lib.rs
//
// Library entry point. The centerpiece is the mining thread manager in the
// miner module, which owns a pool of CPU work threads plus one GPU thread,
// distributes work generations to them, and aggregates their hash counters
// into a single hashes-per-second metric on a poll cadence.
//
// Tree Location:
// - src/lib.rs (root library file)
// - Exports modules: connection, core, miner, utils

pub mod connection;
pub mod core;
pub mod miner;
pub mod utils;

// Re-export commonly used types at the crate root for convenience
pub use crate::connection::{LoopbackConnection, MinerConnection};
pub use crate::core::types::{ManagerConfig, Solution, Work};
pub use crate::miner::{MiningThreadManager, MiningWorker, Timer, WorkBoard, WorkerContext};
pub use crate::utils::error::{MinerError, Result};
