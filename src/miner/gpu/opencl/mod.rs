// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/gpu/opencl/mod.rs

pub mod device;
pub mod engine;

pub use device::OpenClDevice;
pub use engine::Sha256dEngine;
