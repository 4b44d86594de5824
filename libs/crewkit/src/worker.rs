//! Worker lifecycle.
//!
//! A [`Worker`] owns one dedicated OS thread running an [`Activity`]'s
//! periodic loop. The framework owns starting, stop-flag composition,
//! signalling, and joining; the activity owns the work.
//!
//! Concurrency notes:
//! - The started/stopped pair is latching: *not-started* reads as
//!   (started=0, stopped=1), *running* as (1, 0), *stopped* as (_, 1). The
//!   transient (0, 0) exists only inside `start()` and is never visible
//!   through `is_running()`.
//! - Cancellation is cooperative through the composite stop signal; the
//!   worst-case latency is one tick plus the current `tick()` call.
//! - The activity value is parked in a shared slot while the thread runs
//!   and handed back on join, so a fully torn-down worker can be started
//!   again.

use crate::contracts::Activity;
use crate::rendezvous::Rendezvous;
use crate::signal::{self, Event, StopFlag, StopFlagSet};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Coarse loop interval. Responsiveness/overhead trade-off; tests shorten it
/// through [`Worker::with_tick_interval`].
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

// ----- Errors ----------------------------------------------------------------

/// Errors raised by [`Worker::start`]. `Aborted` and `SpawnFailed` leave
/// the worker in the *not-started* state with all run handles released;
/// `AlreadyStarted` is a refusal that leaves the current run untouched.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("already started")]
    AlreadyStarted,
    #[error("a stop flag was raised before start")]
    Aborted,
    #[error("failed to spawn worker thread")]
    SpawnFailed(#[source] std::io::Error),
}

// ----- Worker ----------------------------------------------------------------

/// Lifecycle controller for one background activity.
pub struct Worker<A: Activity> {
    name: String,
    tick_interval: Duration,
    /// Occupied while the worker is idle; the body thread takes the activity
    /// at entry and parks it back before exiting.
    activity: Arc<Mutex<Option<A>>>,
    handle: Option<thread::JoinHandle<()>>,
    started: Event,
    stopped: Event,
    internal_stop: StopFlag,
    external_stop: Option<StopFlag>,
    rendezvous: Option<Rendezvous>,
}

impl<A: Activity> Worker<A> {
    pub fn new(name: impl Into<String>, activity: A) -> Self {
        Self {
            name: name.into(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            activity: Arc::new(Mutex::new(Some(activity))),
            handle: None,
            started: Event::new(false),
            // Not running reads as stopped.
            stopped: Event::new(true),
            internal_stop: StopFlag::new(),
            external_stop: None,
            rendezvous: None,
        }
    }

    /// Shorten or stretch the coarse loop interval (default ~100 ms).
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the worker thread and block until it either published the
    /// started signal (`Ok(true)`) or exited before doing so (`Ok(false)`,
    /// e.g. a failed `setup`). `external` is the controller-owned stop
    /// request; `rendezvous`, when given, enrolls this worker in the crew's
    /// graceful-shutdown meet-up.
    #[tracing::instrument(skip(self, external, rendezvous), fields(worker = %self.name), level = "debug")]
    pub fn start(
        &mut self,
        external: StopFlag,
        rendezvous: Option<Rendezvous>,
    ) -> Result<bool, StartError> {
        if self.handle.is_some() || self.activity.lock().is_none() {
            return Err(StartError::AlreadyStarted);
        }

        self.started.reset();
        self.stopped.reset();
        self.internal_stop.clear();
        self.external_stop = Some(external);
        self.rendezvous = rendezvous;

        let flags = self.signal_stop_flags();
        if flags.any_raised() {
            self.abort_start();
            return Err(StartError::Aborted);
        }

        let body = Body {
            name: self.name.clone(),
            flags,
            group: self.rendezvous.clone(),
            started: self.started.clone(),
            stopped: self.stopped.clone(),
            tick: self.tick_interval,
        };
        let slot = Arc::clone(&self.activity);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let taken = slot.lock().take();
                match taken {
                    Some(activity) => {
                        let activity = body.run(activity);
                        *slot.lock() = Some(activity);
                    }
                    // Lost the activity slot; nothing to run.
                    None => body.stopped.set(),
                }
            });
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                self.abort_start();
                return Err(StartError::SpawnFailed(e));
            }
        }

        // The startup wait can only ever report one of the two signals; the
        // started one is checked first, so it wins when both are already set.
        if signal::wait_any(&[&self.started, &self.stopped], self.tick_interval) == 0 {
            tracing::debug!(worker = %self.name, "worker started");
            Ok(true)
        } else {
            tracing::debug!(worker = %self.name, "worker exited during startup");
            Ok(false)
        }
    }

    /// Request a stop and join the worker thread (unbounded). Idempotent;
    /// safe from the *not-started* and *stopped* states. Join failures are
    /// swallowed.
    #[tracing::instrument(skip(self), fields(worker = %self.name), level = "debug")]
    pub fn stop(&mut self) {
        self.internal_stop.raise();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(worker = %self.name, "worker thread join failed");
            }
        }
        self.external_stop = None;
        self.rendezvous = None;
    }

    /// started and not yet stopped.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.started.is_set() && !self.stopped.is_set()
    }

    /// The latching stopped signal, for controller-side multi-waits.
    pub fn stopped_signal(&self) -> Event {
        self.stopped.clone()
    }

    /// The current stop-flag set {internal, external}; primarily for
    /// internal use and testing.
    pub fn signal_stop_flags(&self) -> StopFlagSet {
        let mut flags = StopFlagSet::new();
        flags.push(self.internal_stop.clone());
        if let Some(external) = &self.external_stop {
            flags.push(external.clone());
        }
        flags
    }

    /// Unified cleanup for every failed `start()` path: the worker must be
    /// observably *not-started* before the error is returned.
    fn abort_start(&mut self) {
        self.internal_stop.raise();
        self.external_stop = None;
        self.rendezvous = None;
        self.stopped.set();
    }
}

impl<A: Activity> Drop for Worker<A> {
    /// Best-effort cleanup so an abandoned worker does not leak its thread.
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

// ----- Body ------------------------------------------------------------------

/// Everything the body thread needs besides the activity itself.
struct Body {
    name: String,
    flags: StopFlagSet,
    group: Option<Rendezvous>,
    started: Event,
    stopped: Event,
    tick: Duration,
}

impl Body {
    /// The worker body state machine. Hook errors and panics are contained
    /// here; nothing propagates out of the thread.
    fn run<A: Activity>(self, mut activity: A) -> A {
        // A stop requested before this thread got scheduled: tear down
        // without joining the crew, so peers never wait on a vote that
        // cannot arrive.
        if self.flags.any_raised() {
            tracing::debug!(worker = %self.name, "stop requested before setup");
            self.teardown(&mut activity);
            self.stopped.set();
            return activity;
        }

        if let Some(group) = &self.group {
            group.announce_started();
        }

        let setup_ok = match catch(|| activity.setup()) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::error!(worker = %self.name, error = %e, "setup failed");
                false
            }
            None => {
                tracing::error!(worker = %self.name, "setup panicked");
                false
            }
        };

        let mut stopping_cleanly = false;
        if setup_ok {
            self.started.set();
            tracing::debug!(worker = %self.name, "running");
            loop {
                thread::sleep(self.tick);
                if self.flags.any_raised() {
                    tracing::debug!(worker = %self.name, "stop requested");
                    stopping_cleanly = true;
                    break;
                }
                match catch(|| activity.tick()) {
                    Some(Ok(true)) => {}
                    Some(Ok(false)) => {
                        tracing::debug!(worker = %self.name, "tick requested exit");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!(worker = %self.name, error = %e, "tick failed");
                        break;
                    }
                    None => {
                        tracing::error!(worker = %self.name, "tick panicked");
                        break;
                    }
                }
            }
        }

        // Once announced, a participant always votes exactly once; only the
        // clean path enters the graceful phase.
        if let Some(group) = &self.group {
            group.submit_clean_vote(stopping_cleanly);
            if stopping_cleanly {
                if group.await_all_clean_votes() {
                    if catch(|| activity.stop_imminent()).is_none() {
                        tracing::error!(worker = %self.name, "stop_imminent panicked");
                    }
                    group.announce_ready_to_stop();
                    group.await_all_ready_to_stop();
                } else {
                    tracing::debug!(worker = %self.name, "a peer aborted; skipping graceful shutdown");
                }
            }
        }

        self.teardown(&mut activity);
        self.stopped.set();
        tracing::debug!(worker = %self.name, "stopped");
        activity
    }

    fn teardown<A: Activity>(&self, activity: &mut A) {
        if catch(|| activity.teardown()).is_none() {
            tracing::error!(worker = %self.name, "teardown panicked");
        }
    }
}

fn catch<T>(f: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).ok()
}

// ----- Tests -----------------------------------------------------------------
