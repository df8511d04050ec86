// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: tests/manager_test.rs
//
// Manager behavior tests driven by synthetic workers, so aggregation,
// stale-solution filtering, crash handling and lifecycle can be asserted
// without timing-sensitive real hashing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use forgemine::core::types::{ManagerConfig, Solution, Work, HEADER_LEN};
use forgemine::miner::{MiningThreadManager, MiningWorker, WorkerContext, WorkerStats};
use forgemine::{MinerConnection, MinerError};

/// Threadless worker the manager can aggregate, restart and retire on demand.
struct FakeWorker {
    label: String,
    stats: Arc<WorkerStats>,
    alive: Arc<AtomicBool>,
    /// Restart leaves the worker dead when false, to exhaust the budget.
    revive_on_restart: bool,
    restarts: Arc<AtomicU64>,
}

impl FakeWorker {
    fn new(label: &str, alive: bool, revive_on_restart: bool) -> Self {
        Self {
            label: label.to_string(),
            stats: Arc::new(WorkerStats::new(label)),
            alive: Arc::new(AtomicBool::new(alive)),
            revive_on_restart,
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MiningWorker for FakeWorker {
    fn label(&self) -> &str {
        &self.label
    }

    fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn stop(&self) {}

    fn join(&mut self) {}

    fn restart(&mut self, _ctx: &WorkerContext) -> forgemine::Result<()> {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        if self.revive_on_restart {
            self.alive.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Connection that records submissions and never issues work, so the board
/// stays entirely under the test's control.
#[derive(Default)]
struct RecordingConnection {
    submitted: Vec<Solution>,
}

impl MinerConnection for RecordingConnection {
    fn fetch_work(&mut self) -> forgemine::Result<Option<Work>> {
        Ok(None)
    }

    fn submit_solution(&mut self, solution: &Solution) -> forgemine::Result<()> {
        self.submitted.push(solution.clone());
        Ok(())
    }

    fn has_issued_work(&self) -> bool {
        true
    }
}

fn test_work(difficulty: u64) -> Work {
    Work::new(vec![0u8; HEADER_LEN], difficulty, 0, u32::MAX)
}

fn solution(generation: u64, worker: &str) -> Solution {
    Solution {
        generation,
        nonce: 42,
        hash: [0u8; 32],
        difficulty: u64::MAX,
        worker: worker.to_string(),
    }
}

/// Build a manager around fake workers, handing back their handles and the
/// context for injecting solutions.
fn fake_manager(
    config: ManagerConfig,
    specs: &[(&str, bool, bool)],
) -> (MiningThreadManager, Vec<(Arc<WorkerStats>, Arc<AtomicBool>, Arc<AtomicU64>)>, WorkerContext) {
    let handles = Arc::new(Mutex::new(Vec::new()));
    let captured_ctx = Arc::new(Mutex::new(None));

    let specs: Vec<(String, bool, bool)> =
        specs.iter().map(|(l, a, r)| (l.to_string(), *a, *r)).collect();
    let handles_in = Arc::clone(&handles);
    let ctx_in = Arc::clone(&captured_ctx);

    let manager = MiningThreadManager::with_workers(config, move |ctx| {
        *ctx_in.lock().unwrap() = Some(ctx.clone());
        specs
            .into_iter()
            .map(|(label, alive, revive)| {
                let worker = FakeWorker::new(&label, alive, revive);
                handles_in.lock().unwrap().push((
                    worker.stats(),
                    Arc::clone(&worker.alive),
                    Arc::clone(&worker.restarts),
                ));
                Box::new(worker) as Box<dyn MiningWorker>
            })
            .collect()
    })
    .expect("manager construction");

    let handles = handles.lock().unwrap().clone();
    let ctx = captured_ctx.lock().unwrap().take().expect("factory ran");
    (manager, handles, ctx)
}

#[test]
fn constructs_real_pool_and_shuts_down() {
    let mut manager = MiningThreadManager::new(ManagerConfig::new(2, true, 0.0)).unwrap();
    assert_eq!(manager.cpu_worker_count(), 2);
    assert_eq!(manager.lost_workers(), 0);
    assert!(!manager.has_work());
    manager.shutdown();
    // Idempotent
    manager.shutdown();
}

#[test]
fn zero_threads_means_no_cpu_workers() {
    let mut manager = MiningThreadManager::new(ManagerConfig::new(0, true, 0.0)).unwrap();
    assert_eq!(manager.cpu_worker_count(), 0);
    manager.shutdown();
}

#[test]
fn rejects_invalid_config() {
    assert!(matches!(
        MiningThreadManager::new(ManagerConfig::new(1, true, 1.5)),
        Err(MinerError::InvalidConfig(_))
    ));
}

#[test]
fn rejects_invalid_work() {
    let (manager, _, _) = fake_manager(ManagerConfig::default(), &[("w0", true, true)]);
    let bad = Work::new(vec![0u8; 10], 1000, 0, u32::MAX);
    assert!(matches!(manager.start_work(bad), Err(MinerError::InvalidWork(_))));
    let empty_span = Work::new(vec![0u8; HEADER_LEN], 1000, 5, 5);
    assert!(matches!(manager.start_work(empty_span), Err(MinerError::InvalidWork(_))));
}

#[test]
fn generations_increase_per_publication() {
    let (manager, _, _) = fake_manager(ManagerConfig::default(), &[("w0", true, true)]);
    assert_eq!(manager.current_generation(), 0);
    manager.start_work(test_work(1000)).unwrap();
    assert_eq!(manager.current_generation(), 1);
    manager.start_work(test_work(1000)).unwrap();
    assert_eq!(manager.current_generation(), 2);
    assert!(manager.has_work());
}

#[test]
fn hash_rate_is_zero_before_first_update() {
    let (manager, handles, _) = fake_manager(ManagerConfig::default(), &[("w0", true, true)]);
    handles[0].0.add_hashes(50_000);
    assert_eq!(manager.hash_rate(), 0);
}

#[test]
fn update_aggregates_worker_counters_into_a_rate() {
    let (mut manager, handles, _) =
        fake_manager(ManagerConfig::default(), &[("w0", true, true), ("w1", true, true)]);
    let started = Instant::now();
    let mut conn = RecordingConnection::default();

    thread::sleep(Duration::from_millis(100));
    handles[0].0.add_hashes(30_000);
    handles[1].0.add_hashes(10_000);
    manager.update(&mut conn).unwrap();
    let measured = started.elapsed().as_secs_f64();

    let rate = manager.hash_rate();
    // The manager's interval is bracketed by our sleep and our measurement.
    assert!(rate > 0);
    assert!(rate as f64 * measured >= 40_000.0 * 0.95);
    assert!(rate as f64 <= 40_000.0 / 0.1 * 1.5);

    // Interval counters were drained, so a quiet interval drops the rate.
    thread::sleep(Duration::from_millis(20));
    manager.update(&mut conn).unwrap();
    assert_eq!(manager.hash_rate(), 0);
    // Lifetime counters survive the drain.
    assert_eq!(handles[0].0.lifetime_hashes(), 30_000);
}

#[test]
fn stale_generation_solutions_are_dropped() {
    let (mut manager, _, ctx) = fake_manager(ManagerConfig::default(), &[("w0", true, true)]);
    let mut conn = RecordingConnection::default();

    manager.start_work(test_work(1000)).unwrap();
    ctx.solutions.send(solution(1, "w0")).unwrap();
    // The swap lands before the solution is drained.
    manager.start_work(test_work(1000)).unwrap();
    manager.update(&mut conn).unwrap();
    assert!(conn.submitted.is_empty());

    ctx.solutions.send(solution(2, "w0")).unwrap();
    manager.update(&mut conn).unwrap();
    assert_eq!(conn.submitted.len(), 1);
    assert_eq!(conn.submitted[0].generation, 2);
    assert_eq!(conn.submitted[0].worker, "w0");
}

#[test]
fn crashed_worker_is_restarted_within_budget() {
    let (mut manager, handles, _) = fake_manager(ManagerConfig::default(), &[("w0", false, true)]);
    let mut conn = RecordingConnection::default();

    manager.update(&mut conn).unwrap();
    assert_eq!(handles[0].2.load(Ordering::Relaxed), 1);
    assert_eq!(manager.lost_workers(), 0);

    // Revived worker aggregates normally again.
    handles[0].0.add_hashes(1000);
    thread::sleep(Duration::from_millis(20));
    manager.update(&mut conn).unwrap();
    assert!(manager.hash_rate() > 0);
}

#[test]
fn crashed_worker_is_retired_after_budget_runs_out() {
    let config = ManagerConfig::default(); // restart budget 2
    let (mut manager, handles, _) = fake_manager(config, &[("w0", false, false)]);
    let mut conn = RecordingConnection::default();

    manager.update(&mut conn).unwrap();
    manager.update(&mut conn).unwrap();
    assert_eq!(handles[0].2.load(Ordering::Relaxed), 2);
    assert_eq!(manager.lost_workers(), 0);

    manager.update(&mut conn).unwrap();
    assert_eq!(manager.lost_workers(), 1);

    // A retired slot is never restarted again and never aggregated.
    handles[0].0.add_hashes(99_999);
    manager.update(&mut conn).unwrap();
    assert_eq!(handles[0].2.load(Ordering::Relaxed), 2);
    assert_eq!(manager.hash_rate(), 0);
}

#[test]
fn crashed_worker_counters_do_not_skew_the_rate() {
    let (mut manager, handles, _) = fake_manager(ManagerConfig::default(), &[("w0", false, true)]);
    let mut conn = RecordingConnection::default();

    // Hashes counted before the crash was noticed are discarded.
    handles[0].0.add_hashes(1_000_000);
    manager.update(&mut conn).unwrap();
    assert_eq!(manager.hash_rate(), 0);
}

#[test]
fn shutdown_withdraws_work_and_rejects_further_calls() {
    let (mut manager, _, _) = fake_manager(ManagerConfig::default(), &[("w0", true, true)]);
    manager.start_work(test_work(1000)).unwrap();
    assert!(manager.has_work());

    manager.shutdown();
    assert!(!manager.has_work());
    assert_eq!(manager.hash_rate(), 0);

    let mut conn = RecordingConnection::default();
    assert!(matches!(manager.update(&mut conn), Err(MinerError::Stopped)));
    assert!(matches!(manager.start_work(test_work(1000)), Err(MinerError::Stopped)));
}
