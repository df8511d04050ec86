// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/utils/error.rs
//
// Error types for the mining thread manager. Failures that stop the whole
// manager surface through these variants; failures local to one worker are
// handled in place by the manager's restart logic and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    /// Work rejected before publication (empty header, zero target, empty
    /// nonce span). StartWork preconditions are never silently ignored.
    #[error("invalid work: {0}")]
    InvalidWork(String),

    /// Manager configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// OS thread creation failed for a worker slot, after retries.
    #[error("failed to spawn worker {slot}: {source}")]
    WorkerSpawn {
        slot: String,
        #[source]
        source: std::io::Error,
    },

    /// No usable GPU device. The manager degrades to CPU-only on this rather
    /// than failing construction.
    #[error("gpu unavailable: {0}")]
    GpuUnavailable(String),

    /// The connection collaborator failed to fetch work or accept a solution.
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation attempted after the manager left the Running state.
    #[error("manager is stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, MinerError>;
