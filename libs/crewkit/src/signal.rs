//! Signalling primitives shared between workers and their controller.
//!
//! Two building blocks live here:
//! - [`Event`]: a latching manual-reset event. Set once per lifecycle,
//!   observable by any number of waiters, reset explicitly before reuse.
//! - [`StopFlag`] / [`StopFlagSet`]: cooperative stop request tokens and
//!   the OR-composition a worker polls.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ----- Event -----------------------------------------------------------------

/// Latching binary event.
///
/// Cloning yields another handle to the same event, so a controller can hold
/// a worker's stopped signal while the worker thread keeps its own handle.
#[derive(Clone, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

#[derive(Default)]
struct EventInner {
    set: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    pub fn new(initially_set: bool) -> Self {
        Self {
            inner: Arc::new(EventInner {
                set: Mutex::new(initially_set),
                cond: Condvar::new(),
            }),
        }
    }

    /// Latch the event and wake every waiter. Setting an already-set event
    /// is a no-op.
    pub fn set(&self) {
        let mut set = self.inner.set.lock();
        if !*set {
            *set = true;
            self.inner.cond.notify_all();
        }
    }

    /// Clear the latch. Only legal while no thread is waiting on it.
    pub fn reset(&self) {
        *self.inner.set.lock() = false;
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        *self.inner.set.lock()
    }

    /// Block until the event is set.
    pub fn wait(&self) {
        let mut set = self.inner.set.lock();
        while !*set {
            self.inner.cond.wait(&mut set);
        }
    }

    /// Block until the event is set or `timeout` elapses. Returns whether
    /// the event was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self.inner.set.lock();
        if *set {
            return true;
        }
        let deadline = Instant::now() + timeout;
        while !*set {
            if self.inner.cond.wait_until(&mut set, deadline).timed_out() {
                break;
            }
        }
        *set
    }
}

/// Wait until any of `events` is set and return the index of the first set
/// event observed. Events other than the first are rechecked every `poll`.
///
/// `events` must be non-empty.
pub fn wait_any(events: &[&Event], poll: Duration) -> usize {
    debug_assert!(!events.is_empty());
    loop {
        for (i, event) in events.iter().enumerate() {
            if event.is_set() {
                return i;
            }
        }
        events[0].wait_timeout(poll);
    }
}

// ----- Stop flags ------------------------------------------------------------

/// Cooperative stop request token.
///
/// The setter publishes with a release store; workers observe with an
/// acquire load. Clones share the underlying flag, so the controller keeps
/// the writing side while each worker holds a read-side clone.
#[derive(Clone, Default)]
pub struct StopFlag {
    raised: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Ordered set of stop flags; the composite stop signal is their OR.
#[derive(Clone, Default)]
pub struct StopFlagSet {
    flags: Vec<StopFlag>,
}

impl StopFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, flag: StopFlag) {
        self.flags.push(flag);
    }

    pub fn any_raised(&self) -> bool {
        self.flags.iter().any(StopFlag::is_raised)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn event_latches_and_is_observed_by_multiple_waiters() {
        let event = Event::new(false);
        assert!(!event.is_set());

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let event = event.clone();
                thread::spawn(move || {
                    event.wait();
                    true
                })
            })
            .collect();

        event.set();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        // Still set after all waiters returned.
        assert!(event.is_set());
    }

    #[test]
    fn event_wait_timeout_reports_expiry() {
        let event = Event::new(false);
        assert!(!event.wait_timeout(Duration::from_millis(20)));
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn event_reset_clears_the_latch() {
        let event = Event::new(true);
        assert!(event.is_set());
        event.reset();
        assert!(!event.is_set());
    }

    #[test]
    fn wait_any_returns_the_set_index() {
        let a = Event::new(false);
        let b = Event::new(false);

        let setter = {
            let b = b.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                b.set();
            })
        };

        assert_eq!(wait_any(&[&a, &b], Duration::from_millis(10)), 1);
        setter.join().unwrap();
    }

    #[test]
    fn flag_set_is_the_or_of_its_members() {
        let a = StopFlag::new();
        let b = StopFlag::new();
        let mut set = StopFlagSet::new();
        set.push(a.clone());
        set.push(b.clone());

        assert!(!set.any_raised());
        b.raise();
        assert!(set.any_raised());
        b.clear();
        assert!(!set.any_raised());
        a.raise();
        assert!(set.any_raised());
    }

    #[test]
    fn flag_clones_share_state() {
        let flag = StopFlag::new();
        let reader = flag.clone();
        flag.raise();
        assert!(reader.is_raised());
    }
}
