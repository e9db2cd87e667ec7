//! Threaded runs of the full engine checked by the table monitor.

use dining_core::{
    DiningError, HungerReport, LeftForkHook, ResourceArbiter, SimulationConfig, Strategy,
    Supervisor,
};
use dining_env::{ConfigError, ForkId, NullObserver, Observer, PhilosopherId, PhilosopherState};
use dining_sim::{SeededContext, TableMonitor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn fast(n: usize, strategy: Strategy) -> SimulationConfig {
    SimulationConfig::new(n)
        .with_strategy(strategy)
        .with_think(1, 10)
        .with_eat(1, 10)
}

fn run_monitored(
    config: SimulationConfig,
    seed: u64,
    for_ms: u64,
) -> (Arc<TableMonitor>, HungerReport) {
    let monitor = Arc::new(TableMonitor::new(config.num_philosophers));
    let observer: Arc<dyn Observer> = monitor.clone();
    let supervisor = Supervisor::start(config, observer, SeededContext::shared(seed)).unwrap();
    thread::sleep(Duration::from_millis(for_ms));
    let report = supervisor.stop(Some(Duration::from_secs(5))).unwrap();
    (monitor, report)
}

#[test]
fn test_mutual_exclusion_under_paired() {
    let (monitor, report) = run_monitored(fast(5, Strategy::Paired), 1, 500);
    assert!(monitor.is_clean(), "{:?}", monitor.violations());
    assert!(report.total_meals() > 0);
}

#[test]
fn test_mutual_exclusion_under_fair() {
    let (monitor, _) = run_monitored(fast(7, Strategy::Fair), 2, 500);
    assert!(monitor.is_clean(), "{:?}", monitor.violations());
}

#[test]
fn test_every_philosopher_eats_under_fair() {
    let (monitor, report) = run_monitored(fast(6, Strategy::Fair), 3, 800);
    assert!(report.starved().is_empty(), "starved: {:?}", report.starved());
    assert!(monitor.meals().iter().all(|&m| m > 0));
}

#[test]
fn test_every_philosopher_eats_under_paired() {
    let (_, report) = run_monitored(fast(5, Strategy::Paired), 4, 800);
    assert!(report.starved().is_empty(), "starved: {:?}", report.starved());
}

#[test]
fn test_two_philosophers_take_turns() {
    let (monitor, report) = run_monitored(fast(2, Strategy::Fair), 5, 300);
    assert!(monitor.is_clean());
    assert_eq!(report.philosophers.len(), 2);
    assert!(report.philosophers.iter().all(|p| p.meals > 0));
}

#[test]
fn test_report_meals_match_monitor() {
    let (monitor, report) = run_monitored(fast(4, Strategy::Paired), 6, 300);
    let agent_meals: Vec<u64> = report.philosophers.iter().map(|p| p.meals).collect();

    // An agent stopped between acquire and reporting Eating has counted a
    // meal the monitor never saw
    for (agent, seen) in agent_meals.iter().zip(monitor.meals()) {
        assert!(*agent >= seen);
        assert!(*agent <= seen + 1);
    }
}

#[test]
fn test_stop_releases_every_fork() {
    let monitor = Arc::new(TableMonitor::new(5));
    let observer: Arc<dyn Observer> = monitor.clone();
    let supervisor =
        Supervisor::start(fast(5, Strategy::Fair), observer, SeededContext::shared(7)).unwrap();
    let arbiter = Arc::clone(supervisor.arbiter());

    thread::sleep(Duration::from_millis(200));
    supervisor.stop(None).unwrap();

    let snapshot = arbiter.snapshot();
    assert!(snapshot.all_free());
    assert!(snapshot.queue.is_empty());
    assert_eq!(monitor.holders(), vec![None; 5]);
}

#[test]
fn test_pause_freezes_and_resume_restarts() {
    let monitor = Arc::new(TableMonitor::new(5));
    let observer: Arc<dyn Observer> = monitor.clone();
    let supervisor =
        Supervisor::start(fast(5, Strategy::Paired), observer, SeededContext::shared(8)).unwrap();

    thread::sleep(Duration::from_millis(150));
    supervisor.pause();
    thread::sleep(Duration::from_millis(50));
    let events = monitor.total_events();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(monitor.total_events(), events);

    supervisor.resume();
    thread::sleep(Duration::from_millis(150));
    assert!(monitor.total_events() > events);

    supervisor.stop(Some(Duration::from_secs(5))).unwrap();
    assert!(monitor.is_clean());
}

#[test]
fn test_single_pause_keeps_table_running() {
    let monitor = Arc::new(TableMonitor::new(5));
    let observer: Arc<dyn Observer> = monitor.clone();
    let supervisor =
        Supervisor::start(fast(5, Strategy::Paired), observer, SeededContext::shared(9)).unwrap();

    supervisor.pause_philosopher(PhilosopherId(0)).unwrap();
    thread::sleep(Duration::from_millis(50));
    let before = monitor.meals();
    thread::sleep(Duration::from_millis(300));
    let after = monitor.meals();

    assert_eq!(before[0], after[0]);
    assert!(after.iter().skip(1).sum::<u64>() > before.iter().skip(1).sum::<u64>());

    let status = supervisor.status();
    assert!(status[0].paused);
    assert!(status[1..].iter().all(|s| !s.paused));

    supervisor.stop(None).unwrap();
}

#[test]
fn test_global_pause_is_not_hungry_time() {
    let config = SimulationConfig::new(2)
        .with_strategy(Strategy::Paired)
        .with_think(0, 0)
        .with_eat(300, 300);
    let supervisor =
        Supervisor::start(config, Arc::new(NullObserver), SeededContext::shared(13)).unwrap();

    // One philosopher is mid-meal and the other blocked in acquire for the whole pause
    thread::sleep(Duration::from_millis(50));
    supervisor.pause();
    thread::sleep(Duration::from_millis(1000));
    supervisor.resume();
    thread::sleep(Duration::from_millis(400));

    let report = supervisor.stop(Some(Duration::from_secs(5))).unwrap();
    assert!(report.total_meals() >= 1);
    assert!(report.max < Duration::from_millis(800), "{}", report);
}

#[test]
fn test_stop_timeout_names_stuck_agent() {
    // A stuck observer call keeps philosopher 0 from ever reaching a checkpoint
    struct Stall;

    impl Observer for Stall {
        fn on_state_change(&self, phil: PhilosopherId, state: PhilosopherState) {
            if phil == PhilosopherId(0) && state == PhilosopherState::Thinking {
                thread::sleep(Duration::from_millis(500));
            }
        }

        fn on_fork_taken(&self, _fork: ForkId, _phil: PhilosopherId) {}

        fn on_fork_available(&self, _fork: ForkId) {}
    }

    let supervisor =
        Supervisor::start(fast(3, Strategy::Paired), Arc::new(Stall), SeededContext::shared(10))
            .unwrap();
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    let err = supervisor.stop(Some(Duration::from_millis(50))).unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(400));
    match err {
        DiningError::StopTimeout { pending, timeout_ms } => {
            assert_eq!(pending, vec![0]);
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_independent_deadlock_unwinds_on_stop() {
    let n = 4;
    let monitor = Arc::new(TableMonitor::new(n));
    let observer: Arc<dyn Observer> = monitor.clone();

    // Everyone holds a left fork before anyone looks right
    let barrier = Arc::new(Barrier::new(n));
    let arrivals = Arc::new(AtomicUsize::new(0));
    let hook: LeftForkHook = Arc::new(move |_phil: PhilosopherId| {
        if arrivals.fetch_add(1, Ordering::SeqCst) < n {
            barrier.wait();
        }
    });
    let arbiter = Arc::new(
        ResourceArbiter::new(n, Strategy::Independent, Arc::clone(&observer))
            .unwrap()
            .with_left_fork_hook(hook),
    );

    let supervisor = Supervisor::start_with_arbiter(
        fast(n, Strategy::Independent),
        Arc::clone(&arbiter),
        observer,
        SeededContext::shared(11),
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while arbiter.snapshot().held_count() < n && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(100));
    assert_eq!(arbiter.snapshot().held_count(), n);
    assert!(monitor.meals().iter().all(|&m| m == 0));
    assert!(supervisor
        .status()
        .iter()
        .all(|s| s.state == PhilosopherState::Hungry));

    let report = supervisor.stop(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(report.total_meals(), 0);
    assert!(arbiter.snapshot().all_free());
    assert!(monitor.is_clean(), "{:?}", monitor.violations());
}

#[test]
fn test_mismatched_arbiter_is_rejected() {
    let arbiter = Arc::new(ResourceArbiter::new(3, Strategy::Paired, Arc::new(NullObserver)).unwrap());
    let result = Supervisor::start_with_arbiter(
        fast(4, Strategy::Paired),
        arbiter,
        Arc::new(NullObserver),
        SeededContext::shared(12),
    );
    assert!(matches!(
        result,
        Err(DiningError::Config(ConfigError::ForkCountMismatch { forks: 3, philosophers: 4 }))
    ));
}
