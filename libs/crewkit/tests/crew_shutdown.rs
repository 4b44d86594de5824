//! Multi-worker shutdown scenarios: the graceful two-barrier rendezvous and
//! its abandonment when any peer exits uncleanly.

use anyhow::Result;
use crewkit::{Activity, Rendezvous, StopFlag, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Default)]
struct Counters {
    teardowns: AtomicUsize,
    stop_imminents: AtomicUsize,
}

/// Loops forever, or exits uncleanly after `fail_after` ticks.
struct Member {
    counters: Arc<Counters>,
    fail_after: Option<usize>,
    ticks: usize,
}

impl Member {
    fn looping(counters: &Arc<Counters>) -> Self {
        Self {
            counters: counters.clone(),
            fail_after: None,
            ticks: 0,
        }
    }

    fn failing_after(counters: &Arc<Counters>, fail_after: usize) -> Self {
        Self {
            counters: counters.clone(),
            fail_after: Some(fail_after),
            ticks: 0,
        }
    }
}

impl Activity for Member {
    fn tick(&mut self) -> Result<bool> {
        self.ticks += 1;
        Ok(self.fail_after.map_or(true, |limit| self.ticks < limit))
    }

    fn stop_imminent(&mut self) {
        self.counters.stop_imminents.fetch_add(1, Ordering::SeqCst);
    }

    fn teardown(&mut self) {
        self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn clean_crew_passes_the_graceful_rendezvous() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let crew = Rendezvous::new();
    let external = StopFlag::new();

    let mut a = Worker::new("crew-a", Member::looping(&counters)).with_tick_interval(TICK);
    let mut b = Worker::new("crew-b", Member::looping(&counters)).with_tick_interval(TICK);
    assert!(a.start(external.clone(), Some(crew.clone())).unwrap());
    assert!(b.start(external.clone(), Some(crew.clone())).unwrap());
    assert_eq!(crew.started_count(), 2);

    external.raise();
    a.stop();
    b.stop();

    // Both voted clean, both ran stop_imminent, both passed the second
    // barrier, both tore down.
    assert_eq!(crew.votes_recorded(), 2);
    assert_eq!(crew.ready_to_stop_count(), 2);
    assert_eq!(counters.stop_imminents.load(Ordering::SeqCst), 2);
    assert_eq!(counters.teardowns.load(Ordering::SeqCst), 2);
}

#[test]
fn one_unclean_exit_abandons_the_rendezvous() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let crew = Rendezvous::new();
    let external = StopFlag::new();

    let mut failing =
        Worker::new("crew-failing", Member::failing_after(&counters, 3)).with_tick_interval(TICK);
    let mut steady = Worker::new("crew-steady", Member::looping(&counters)).with_tick_interval(TICK);
    assert!(failing.start(external.clone(), Some(crew.clone())).unwrap());
    assert!(steady.start(external.clone(), Some(crew.clone())).unwrap());

    // The failing member leaves on its own; its unclean vote is recorded
    // even while the steady one keeps running.
    assert!(failing
        .stopped_signal()
        .wait_timeout(Duration::from_secs(2)));
    assert_eq!(crew.votes_recorded(), 1);

    external.raise();
    steady.stop();
    failing.stop();

    // The steady member's clean vote met the unclean one: nobody ran
    // stop_imminent, nobody reached the ready barrier, both tore down.
    assert_eq!(crew.votes_recorded(), 2);
    assert_eq!(crew.ready_to_stop_count(), 0);
    assert_eq!(counters.stop_imminents.load(Ordering::SeqCst), 0);
    assert_eq!(counters.teardowns.load(Ordering::SeqCst), 2);
}

#[test]
fn reset_allows_an_identical_second_run() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let crew = Rendezvous::new();

    for round in 1..=2 {
        let external = StopFlag::new();
        let mut a = Worker::new("round-a", Member::looping(&counters)).with_tick_interval(TICK);
        let mut b = Worker::new("round-b", Member::looping(&counters)).with_tick_interval(TICK);
        assert!(a.start(external.clone(), Some(crew.clone())).unwrap());
        assert!(b.start(external.clone(), Some(crew.clone())).unwrap());

        external.raise();
        a.stop();
        b.stop();

        assert_eq!(crew.started_count(), 2);
        assert_eq!(crew.ready_to_stop_count(), 2);
        assert_eq!(counters.stop_imminents.load(Ordering::SeqCst), 2 * round);

        // No participant thread is alive here, so the crew may be reset.
        crew.reset();
        assert_eq!(crew.started_count(), 0);
        assert_eq!(crew.votes_recorded(), 0);
    }
}

#[test]
fn solo_member_rendezvous_degenerates_gracefully() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let crew = Rendezvous::new();
    let external = StopFlag::new();

    let mut solo = Worker::new("crew-solo", Member::looping(&counters)).with_tick_interval(TICK);
    assert!(solo.start(external.clone(), Some(crew.clone())).unwrap());

    external.raise();
    solo.stop();

    assert_eq!(crew.votes_recorded(), 1);
    assert_eq!(crew.ready_to_stop_count(), 1);
    assert_eq!(counters.stop_imminents.load(Ordering::SeqCst), 1);
    assert_eq!(counters.teardowns.load(Ordering::SeqCst), 1);
}
