// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/mod.rs
//
// Mining side of the crate: the thread manager, the CPU and GPU workers it
// owns, their shared work board and statistics, and the interval timer.

pub mod cpu;
pub mod gpu;
pub mod manager;
pub mod stats;
pub mod timer;
pub mod worker;

pub use cpu::CpuWorker;
pub use gpu::GpuWorker;
pub use manager::MiningThreadManager;
pub use stats::WorkerStats;
pub use timer::Timer;
pub use worker::{MiningWorker, WorkBoard, WorkerContext};
