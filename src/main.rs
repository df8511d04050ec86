// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/main.rs
//
// Binary entry point. Wires the mining thread manager to a loopback work
// source and drives it on the configured poll cadence, logging the aggregate
// hash rate each tick and a per-worker summary at the end of the run.

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use forgemine::core::types::{Args, ManagerConfig};
use forgemine::miner::MiningThreadManager;
use forgemine::utils::format::FormatUtils;
use forgemine::LoopbackConnection;

const LOG_TARGET: &str = "forgemine::main";

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!(target: LOG_TARGET, "fatal: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> forgemine::Result<()> {
    args.validate()?;

    let thread_count = if args.threads == 0 { num_cpus::get() } else { args.threads };
    let config = ManagerConfig::new(thread_count, !args.no_sse, args.gpu_percentage);

    info!(target: LOG_TARGET,
        "starting: {} cpu thread(s), gpu share {:.2}, difficulty {}, {}s run",
        thread_count, args.gpu_percentage, args.difficulty, args.duration);

    let mut manager = MiningThreadManager::new(config)?;
    let mut connection = LoopbackConnection::new(args.difficulty);

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let poll = Duration::from_millis(args.poll_ms);

    while Instant::now() < deadline {
        thread::sleep(poll);
        manager.update(&mut connection)?;
        info!(target: LOG_TARGET,
            "{} | generation {} | accepted {} | rejected {}",
            FormatUtils::format_hashrate(manager.hash_rate() as f64),
            manager.current_generation(),
            connection.accepted(),
            connection.rejected());
        if manager.lost_workers() > 0 {
            info!(target: LOG_TARGET, "{} worker slot(s) retired", manager.lost_workers());
        }
    }

    manager.shutdown();

    info!(target: LOG_TARGET, "=== run summary ===");
    for stats in manager.worker_stats() {
        info!(target: LOG_TARGET,
            "{:>8}: {} hashes, {} solution(s), peak {}",
            stats.label(),
            FormatUtils::format_number(stats.lifetime_hashes()),
            stats.solutions_found(),
            FormatUtils::format_hashrate(stats.peak_rate() as f64));
    }
    info!(target: LOG_TARGET,
        "templates issued {}, accepted {}, rejected {}, best difficulty {}",
        connection.issued(),
        connection.accepted(),
        connection.rejected(),
        connection.best_difficulty());
    if manager.is_degraded() {
        info!(target: LOG_TARGET, "ran in degraded CPU-only mode (no usable GPU device)");
    }

    Ok(())
}
