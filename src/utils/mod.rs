// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/utils/mod.rs

pub mod error;
pub mod format;

pub use error::{MinerError, Result};
pub use format::FormatUtils;
