//! Exclusive lock with owner tracking.
//!
//! A thin layer over [`parking_lot::Mutex`] that remembers which thread holds
//! the lock, so that a thread locking a mutex it already holds is reported
//! instead of silently deadlocking. There is no timeout and no try-lock.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Condvar;

use crate::check::usage_check;

/// Token value meaning "nobody holds the lock".
const NO_OWNER: usize = 0;

static NEXT_THREAD_TOKEN: AtomicUsize = AtomicUsize::new(1);
static NEXT_MUTEX_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_TOKEN: usize = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Returns a process-unique, non-zero token for the calling thread.
fn current_thread_token() -> usize {
    THREAD_TOKEN.with(|token| *token)
}

/// Exclusive lock protecting a value of type `T`.
///
/// The lock is not reentrant. Locking it again from the thread that already
/// holds it is a usage bug, fatal in debug builds.
///
/// ## Usage
///
/// ```rust
/// use courier_core::Mutex;
///
/// let frames = Mutex::new(0u64);
/// {
///     let mut guard = frames.lock();
///     *guard += 1;
/// } // released here
/// assert_eq!(*frames.lock(), 1);
/// ```
pub struct Mutex<T> {
    raw: parking_lot::Mutex<T>,
    /// Token of the thread currently holding `raw`, or [`NO_OWNER`].
    owner: AtomicUsize,
    /// Process-unique and stable across moves, unlike the address.
    id: usize,
}

impl<T> Mutex<T> {
    /// Creates a new unlocked mutex.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            raw: parking_lot::Mutex::new(value),
            owner: AtomicUsize::new(NO_OWNER),
            id: NEXT_MUTEX_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Blocks the calling thread until the lock is acquired.
    ///
    /// The lock is released when the returned guard is dropped.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the calling thread already holds the lock.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let token = current_thread_token();
        // A thread always observes its own last store, so Relaxed is enough
        // to detect re-locking from the holder.
        usage_check!(
            self.owner.load(Ordering::Relaxed) != token,
            "mutex re-locked by the thread that already holds it"
        );
        let raw = self.raw.lock();
        self.owner.store(token, Ordering::Relaxed);
        MutexGuard { mutex: self, raw }
    }

    /// Returns whether some thread currently holds the lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// No locking is needed: the exclusive borrow proves nobody else holds it.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.raw.get_mut()
    }

    /// Consumes the mutex and returns the protected value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.raw.into_inner()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a [`Mutex`].
///
/// Dropping the guard releases the lock, on every exit path.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    raw: parking_lot::MutexGuard<'a, T>,
}

impl<T> MutexGuard<'_, T> {
    /// Releases the lock. Equivalent to dropping the guard.
    #[inline]
    pub fn unlock(guard: Self) {
        drop(guard);
    }

    /// Identity of the mutex this guard holds.
    #[inline]
    pub(crate) fn mutex_id(&self) -> usize {
        self.mutex.id
    }

    /// Atomically releases the lock and blocks on `cond`, re-acquiring the
    /// lock before returning. May return spuriously.
    pub(crate) fn park(&mut self, cond: &Condvar) {
        self.mutex.owner.store(NO_OWNER, Ordering::Relaxed);
        cond.wait(&mut self.raw);
        self.mutex.owner.store(current_thread_token(), Ordering::Relaxed);
    }

    /// Like [`park`](Self::park) but gives up at `deadline`.
    ///
    /// Returns `true` if the deadline passed.
    pub(crate) fn park_until(&mut self, cond: &Condvar, deadline: Instant) -> bool {
        self.mutex.owner.store(NO_OWNER, Ordering::Relaxed);
        let timed_out = cond.wait_until(&mut self.raw, deadline).timed_out();
        self.mutex.owner.store(current_thread_token(), Ordering::Relaxed);
        timed_out
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.raw
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.raw
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Cleared before `raw` unlocks, so the next owner never sees our token.
        self.mutex.owner.store(NO_OWNER, Ordering::Relaxed);
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_and_release() {
        let mutex = Mutex::new(5);
        {
            let mut guard = mutex.lock();
            assert!(mutex.is_locked());
            *guard += 1;
        }
        assert!(!mutex.is_locked());
        assert_eq!(*mutex.lock(), 6);
    }

    #[test]
    fn test_explicit_unlock() {
        let mutex = Mutex::new(());
        let guard = mutex.lock();
        MutexGuard::unlock(guard);
        assert!(!mutex.is_locked());
        // Lockable again from the same thread.
        let _guard = mutex.lock();
    }

    #[test]
    fn test_exclusive_across_threads() {
        let mutex = Arc::new(Mutex::new(0u64));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *mutex.lock() += 1;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(*mutex.lock(), 4000);
    }

    #[test]
    fn test_get_mut_without_locking() {
        let mut mutex = Mutex::new(vec![1, 2]);
        mutex.get_mut().push(3);
        assert_eq!(mutex.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_thread_tokens_are_unique() {
        let here = current_thread_token();
        let there = thread::spawn(current_thread_token).join().unwrap();
        assert_ne!(here, NO_OWNER);
        assert_ne!(here, there);
        assert_eq!(here, current_thread_token());
    }

    #[test]
    fn test_identity_survives_moves() {
        let first = Mutex::new(1);
        let id = first.lock().mutex_id();
        let moved = Box::new(first);
        assert_eq!(moved.lock().mutex_id(), id);
        assert_ne!(Mutex::new(1).lock().mutex_id(), id);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "mutex re-locked")]
    fn test_relock_from_holder_panics() {
        let mutex = Mutex::new(());
        let _first = mutex.lock();
        let _second = mutex.lock();
    }
}
