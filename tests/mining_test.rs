// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: tests/mining_test.rs
//
// End-to-end soak tests: real CPU workers hashing loopback work. Difficulty
// is kept low enough that a short run finds solutions with overwhelming
// probability.

use std::thread;
use std::time::Duration;

use forgemine::core::types::ManagerConfig;
use forgemine::miner::MiningThreadManager;
use forgemine::LoopbackConnection;

fn soak(config: ManagerConfig, difficulty: u64, ticks: u32) -> (MiningThreadManager, LoopbackConnection) {
    let mut manager = MiningThreadManager::new(config).expect("manager construction");
    let mut connection = LoopbackConnection::new(difficulty);
    for _ in 0..ticks {
        thread::sleep(Duration::from_millis(100));
        manager.update(&mut connection).expect("update");
    }
    (manager, connection)
}

#[test]
fn batch_path_mines_loopback_work() {
    let (mut manager, connection) = soak(ManagerConfig::new(2, true, 0.0), 10_000, 15);

    let total: u64 = manager.worker_stats().iter().map(|s| s.lifetime_hashes()).sum();
    assert!(total > 0, "workers never hashed");
    assert!(connection.issued() >= 1);
    assert!(connection.accepted() >= 1, "no solution found in {} hashes", total);
    assert!(connection.best_difficulty() >= 10_000);
    assert!(manager.current_generation() >= 1);
    assert_eq!(manager.lost_workers(), 0);

    manager.shutdown();
    assert_eq!(manager.hash_rate(), 0);
    assert!(!manager.has_work());
}

#[test]
fn scalar_path_mines_loopback_work() {
    let (mut manager, connection) = soak(ManagerConfig::new(1, false, 0.0), 1_000, 10);

    let total: u64 = manager.worker_stats().iter().map(|s| s.lifetime_hashes()).sum();
    assert!(total > 0);
    assert!(connection.accepted() >= 1);
    manager.shutdown();
}

#[test]
fn hash_rate_is_reported_while_mining() {
    let mut manager = MiningThreadManager::new(ManagerConfig::new(2, true, 0.0)).unwrap();
    let mut connection = LoopbackConnection::new(u64::MAX / 2);

    assert_eq!(manager.hash_rate(), 0);
    let mut saw_rate = false;
    for _ in 0..10 {
        thread::sleep(Duration::from_millis(100));
        manager.update(&mut connection).unwrap();
        if manager.hash_rate() > 0 {
            saw_rate = true;
            break;
        }
    }
    assert!(saw_rate, "hash rate never rose above zero");
    manager.shutdown();
}

#[cfg(not(feature = "gpu"))]
#[test]
fn full_gpu_share_parks_cpu_workers() {
    // With the whole capacity assigned to the GPU and no device present, the
    // pool idles but stays healthy and responsive.
    let (mut manager, connection) = soak(ManagerConfig::new(1, true, 1.0), 1_000, 3);

    assert!(manager.is_degraded());
    let total: u64 = manager.worker_stats().iter().map(|s| s.lifetime_hashes()).sum();
    assert_eq!(total, 0);
    assert_eq!(connection.accepted(), 0);
    assert_eq!(manager.lost_workers(), 0);
    manager.shutdown();
}

#[cfg(not(feature = "gpu"))]
#[test]
fn zero_gpu_share_is_not_degraded() {
    let mut manager = MiningThreadManager::new(ManagerConfig::new(1, true, 0.0)).unwrap();
    assert!(!manager.is_degraded());
    manager.shutdown();
}
