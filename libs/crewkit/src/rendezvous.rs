//! Shutdown rendezvous shared by a crew of workers.
//!
//! Counts participants as their threads come up, collects one clean/unclean
//! vote per participant on the way down, and provides the two barriers a
//! graceful shutdown passes through: *all voted clean* and *all ready to
//! stop*. Participation is counted rather than fixed because the crew is
//! assembled dynamically at start time.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

const BARRIER_POLL: Duration = Duration::from_millis(100);

/// Rendezvous handle. Clones share the same state; the controller keeps one
/// and hands one to each participating worker. It must outlive every
/// participant.
#[derive(Clone, Default)]
pub struct Rendezvous {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    changed: Condvar,
}

#[derive(Default)]
struct State {
    started: usize,
    ready_to_stop: usize,
    votes: Vec<bool>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero both counts and clear the votes.
    ///
    /// Caller responsibility: no participant thread is alive.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.started = 0;
        state.ready_to_stop = 0;
        state.votes.clear();
    }

    /// Count one participant in; called once as each worker thread enters.
    pub fn announce_started(&self) {
        let mut state = self.inner.state.lock();
        state.started += 1;
        self.inner.changed.notify_all();
    }

    /// Record this participant's shutdown vote. Called exactly once per
    /// announced participant.
    pub fn submit_clean_vote(&self, clean: bool) {
        let mut state = self.inner.state.lock();
        assert!(
            state.votes.len() < state.started,
            "more shutdown votes than announced participants"
        );
        state.votes.push(clean);
        self.inner.changed.notify_all();
    }

    /// First barrier: block until every announced participant has voted, or
    /// until any vote is unclean.
    ///
    /// Returns `false` as soon as one unclean vote is recorded, without
    /// waiting for the remaining votes, so no clean voter blocks on a
    /// graceful shutdown a peer has already declined. Returns `true` only
    /// once all votes are in and all are clean.
    pub fn await_all_clean_votes(&self) -> bool {
        let mut state = self.inner.state.lock();
        loop {
            if state.votes.iter().any(|clean| !clean) {
                tracing::debug!("shutdown rendezvous: a peer voted unclean");
                return false;
            }
            if state.votes.len() == state.started {
                tracing::debug!(participants = state.started, "shutdown rendezvous: all voted clean");
                return true;
            }
            self.inner.changed.wait_for(&mut state, BARRIER_POLL);
        }
    }

    /// Count this participant as ready to stop. Only reached on the clean
    /// path, after `await_all_clean_votes` returned `true`.
    pub fn announce_ready_to_stop(&self) {
        let mut state = self.inner.state.lock();
        assert!(
            state.ready_to_stop < state.started,
            "more ready-to-stop announcements than announced participants"
        );
        state.ready_to_stop += 1;
        self.inner.changed.notify_all();
    }

    /// Second barrier: block until every announced participant is ready to
    /// stop.
    pub fn await_all_ready_to_stop(&self) {
        let mut state = self.inner.state.lock();
        while state.ready_to_stop != state.started {
            self.inner.changed.wait_for(&mut state, BARRIER_POLL);
        }
    }

    // Read-only accessors for controllers and tests.

    pub fn started_count(&self) -> usize {
        self.inner.state.lock().started
    }

    pub fn ready_to_stop_count(&self) -> usize {
        self.inner.state.lock().ready_to_stop
    }

    pub fn votes_recorded(&self) -> usize {
        self.inner.state.lock().votes.len()
    }
}
