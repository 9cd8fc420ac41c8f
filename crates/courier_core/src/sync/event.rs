//! # Event
//!
//! Condition-variable-like wait/notify primitive with a sticky state.
//!
//! ## State Machine
//!
//! ```text
//!               notify_one()              first wait() observes it
//! NotifyNone ─────────────────► NotifyOne ─────────────────────────► NotifyNone
//!
//!               notify_all()              last released waiter leaves
//! NotifyNone ─────────────────► NotifyAll ─────────────────────────► NotifyNone
//! ```
//!
//! A `NotifyOne` sent while nobody waits stays pending and lets the next
//! waiter straight through. A `NotifyAll` releases exactly the threads that
//! were waiting when it was sent: it is tagged with a generation number, so a
//! thread that starts waiting afterwards blocks normally instead of slipping
//! through while the released waiters drain out.
//!
//! ## Thread Safety
//!
//! Every operation takes the caller's [`MutexGuard`], so the bookkeeping below
//! is only ever touched by the thread holding the guarding [`Mutex`]. The
//! atomics are for `Sync`; the mutex provides the ordering, hence `Relaxed`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Condvar;

use crate::check::usage_check;
use super::MutexGuard;

/// Mutex identity meaning "not bound yet".
const UNBOUND: usize = 0;

/// Observable state of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventState {
    /// Idle: waiters block.
    NotifyNone,
    /// A single notification is pending; the next waiter consumes it.
    NotifyOne,
    /// A broadcast is releasing the waiters that were blocked when it was sent.
    NotifyAll,
}

/// Wait/notify primitive guarded by a caller-held [`Mutex`](super::Mutex).
///
/// An `Event` binds to the first mutex it is used with. Using it with a
/// different mutex afterwards is a usage bug.
///
/// ## Usage
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use courier_core::{Event, Mutex};
///
/// let shared = Arc::new((Mutex::new(false), Event::new()));
///
/// let producer = {
///     let shared = Arc::clone(&shared);
///     thread::spawn(move || {
///         let (ready, event) = &*shared;
///         let mut guard = ready.lock();
///         *guard = true;
///         event.notify_one(&guard);
///     })
/// };
///
/// let (ready, event) = &*shared;
/// let mut guard = ready.lock();
/// while !*guard {
///     event.wait(&mut guard);
/// }
/// drop(guard);
/// producer.join().unwrap();
/// ```
pub struct Event {
    cond: Condvar,
    /// A `notify_one` nobody has consumed yet.
    pending_one: AtomicBool,
    /// Threads currently inside `wait*`.
    num_waiting: AtomicU32,
    /// Bumped by every `notify_all` that had waiters.
    generation: AtomicU64,
    /// Waiters released by the last broadcast that have not returned yet.
    broadcast_remaining: AtomicU32,
    /// Identity of the mutex this event is used with.
    bound: AtomicUsize,
}

impl Event {
    /// Creates an idle event with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cond: Condvar::new(),
            pending_one: AtomicBool::new(false),
            num_waiting: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            broadcast_remaining: AtomicU32::new(0),
            bound: AtomicUsize::new(UNBOUND),
        }
    }

    /// Blocks until this event is notified.
    ///
    /// The lock held by `guard` is released while blocked and re-acquired
    /// before returning. Spurious wakeups of the underlying condition variable
    /// are absorbed. Callers still re-check their own predicate afterwards:
    /// a notification says "something changed", not "your condition holds".
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the event is used with a second mutex.
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.bind(guard);
        let entered = self.enter();
        loop {
            if let Some(by_broadcast) = self.try_release(entered) {
                self.leave(by_broadcast);
                return;
            }
            guard.park(&self.cond);
        }
    }

    /// Blocks until this event is notified or `timeout` elapses.
    ///
    /// Returns `true` if the event was notified, `false` on timeout.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the event is used with a second mutex.
    pub fn wait_for<T>(&self, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(guard, deadline),
            None => {
                self.wait(guard);
                true
            }
        }
    }

    /// Blocks until this event is notified or `deadline` passes.
    ///
    /// Returns `true` if the event was notified, `false` on timeout. A
    /// notification that lands together with the deadline still counts.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the event is used with a second mutex.
    pub fn wait_until<T>(&self, guard: &mut MutexGuard<'_, T>, deadline: Instant) -> bool {
        self.bind(guard);
        let entered = self.enter();
        let mut timed_out = false;
        loop {
            if let Some(by_broadcast) = self.try_release(entered) {
                self.leave(by_broadcast);
                return true;
            }
            if timed_out {
                self.leave(false);
                return false;
            }
            timed_out = guard.park_until(&self.cond, deadline);
        }
    }

    /// Wakes a single waiter.
    ///
    /// If nobody is blocked the notification stays pending and the next call
    /// to [`wait`](Self::wait) returns immediately.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the event is used with a second mutex.
    pub fn notify_one<T>(&self, guard: &MutexGuard<'_, T>) {
        self.bind(guard);
        self.pending_one.store(true, Ordering::Relaxed);
        self.cond.notify_one();
    }

    /// Wakes every thread currently blocked in `wait*`.
    ///
    /// Threads that start waiting after this call are not released by it.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the event is used with a second mutex.
    pub fn notify_all<T>(&self, guard: &MutexGuard<'_, T>) {
        self.bind(guard);
        let waiting = self.num_waiting.load(Ordering::Relaxed);
        if waiting == 0 {
            return;
        }
        // The broadcast releases everyone, a pending single is subsumed.
        self.pending_one.store(false, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.broadcast_remaining.store(waiting, Ordering::Relaxed);
        self.cond.notify_all();
    }

    /// Returns the current state.
    ///
    /// Only stable while the guarding mutex is held; otherwise a snapshot.
    #[must_use]
    pub fn state(&self) -> EventState {
        if self.broadcast_remaining.load(Ordering::Relaxed) > 0 {
            EventState::NotifyAll
        } else if self.pending_one.load(Ordering::Relaxed) {
            EventState::NotifyOne
        } else {
            EventState::NotifyNone
        }
    }

    /// Returns the number of threads currently inside `wait*`.
    #[must_use]
    pub fn num_waiting(&self) -> u32 {
        self.num_waiting.load(Ordering::Relaxed)
    }

    /// Registers a waiter and returns the generation it entered in.
    fn enter(&self) -> u64 {
        self.num_waiting.fetch_add(1, Ordering::Relaxed);
        self.generation.load(Ordering::Relaxed)
    }

    /// Checks whether a waiter that entered in generation `entered` may leave.
    ///
    /// Returns `Some(true)` if a later broadcast released it, `Some(false)` if
    /// it consumed a pending single notification, `None` to keep waiting.
    fn try_release(&self, entered: u64) -> Option<bool> {
        if self.generation.load(Ordering::Relaxed) != entered {
            Some(true)
        } else if self.pending_one.swap(false, Ordering::Relaxed) {
            Some(false)
        } else {
            None
        }
    }

    /// Unregisters a waiter, closing the broadcast once its waiters are out.
    fn leave(&self, by_broadcast: bool) {
        self.num_waiting.fetch_sub(1, Ordering::Relaxed);
        if by_broadcast {
            // Saturating: a newer broadcast may already have reset the count.
            let _ = self.broadcast_remaining.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |remaining| remaining.checked_sub(1),
            );
        }
    }

    /// Binds the event to the guard's mutex on first use, checks it after.
    fn bind<T>(&self, guard: &MutexGuard<'_, T>) {
        let id = guard.mutex_id();
        let bound = match self
            .bound
            .compare_exchange(UNBOUND, id, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => id,
            Err(existing) => existing,
        };
        usage_check!(
            bound == id,
            "event used with a mutex other than the one it is bound to"
        );
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("state", &self.state())
            .field("num_waiting", &self.num_waiting())
            .finish_non_exhaustive()
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        let waiting = *self.num_waiting.get_mut();
        usage_check!(
            waiting == 0,
            "event destroyed while {waiting} threads were still waiting"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_new_event_is_idle() {
        let event = Event::new();
        assert_eq!(event.state(), EventState::NotifyNone);
        assert_eq!(event.num_waiting(), 0);
    }

    #[test]
    fn test_pending_notify_one_is_not_lost() {
        let mutex = Mutex::new(());
        let event = Event::new();

        let mut guard = mutex.lock();
        event.notify_one(&guard);
        assert_eq!(event.state(), EventState::NotifyOne);

        // Nobody was waiting: the next wait passes straight through.
        event.wait(&mut guard);
        assert_eq!(event.state(), EventState::NotifyNone);
        assert_eq!(event.num_waiting(), 0);
    }

    #[test]
    fn test_notify_one_is_consumed_once() {
        let mutex = Mutex::new(());
        let event = Event::new();

        let mut guard = mutex.lock();
        event.notify_one(&guard);
        event.notify_one(&guard);
        event.wait(&mut guard);
        // Two unobserved notify_one calls collapse into one.
        assert!(!event.wait_for(&mut guard, Duration::from_millis(10)));
    }

    #[test]
    fn test_notify_all_without_waiters_is_dropped() {
        let mutex = Mutex::new(());
        let event = Event::new();

        let mut guard = mutex.lock();
        event.notify_all(&guard);
        assert_eq!(event.state(), EventState::NotifyNone);
        assert!(!event.wait_for(&mut guard, Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_for_times_out() {
        let mutex = Mutex::new(());
        let event = Event::new();

        let mut guard = mutex.lock();
        let start = Instant::now();
        assert!(!event.wait_for(&mut guard, Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(event.num_waiting(), 0);
    }

    #[test]
    fn test_wait_wakes_on_notify_from_other_thread() {
        let shared = Arc::new((Mutex::new(0u32), Event::new()));

        let waiter = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let (value, event) = &*shared;
                let mut guard = value.lock();
                while *guard == 0 {
                    event.wait(&mut guard);
                }
                *guard
            })
        };

        {
            let (value, event) = &*shared;
            let mut guard = value.lock();
            *guard = 7;
            event.notify_one(&guard);
        }

        assert_eq!(waiter.join().unwrap(), 7);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "event used with a mutex other than")]
    fn test_second_mutex_panics() {
        let first = Mutex::new(());
        let second = Mutex::new(());
        let event = Event::new();

        event.notify_one(&first.lock());
        event.notify_one(&second.lock());
    }
}
