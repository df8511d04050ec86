// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/timer.rs
//
// Monotonic elapsed-time source for rate computation. No wall-clock
// correctness is required beyond monotonicity.

use std::time::{Duration, Instant};

pub struct Timer {
    started: Instant,
    last_lap: Instant,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_lap: now,
        }
    }

    /// Time since the previous lap (or since construction for the first
    /// call), advancing the lap marker.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_lap);
        self.last_lap = now;
        elapsed
    }

    /// Total time since construction.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
