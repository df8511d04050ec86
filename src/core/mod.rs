// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/core/mod.rs
//
// Core functionality: data structures, hashing and difficulty math.

pub mod difficulty;
pub mod sha256d;
pub mod types;

// Re-export the most commonly used items
pub use difficulty::{calculate_difficulty, difficulty_to_target, hash_meets_target, U256};
pub use sha256d::{sha256d_hash, sha256d_hash_with_nonce, sha256d_hash_with_nonce_batch};
pub use types::{Args, ManagerConfig, Solution, Work, HEADER_LEN};
