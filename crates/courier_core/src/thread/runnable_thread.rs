//! OS thread wrapper that drives a [`Runnable`] through its lifecycle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crate::check::usage_check;
use crate::config::ThreadConfig;
use crate::error::{ThreadError, ThreadResult};

use super::handle::{Runnable, ThreadHandle, ThreadState};

/// An OS thread bound to a [`Runnable`].
///
/// The owner must [`join`](Self::join) a started thread before dropping it,
/// or call [`destroy`](Self::destroy). Dropping a live thread is a usage bug,
/// fatal in debug builds.
///
/// ## Usage
///
/// ```rust
/// use courier_core::{Runnable, RunnableThread, ThreadState};
///
/// struct Sum {
///     total: u64,
/// }
///
/// impl Runnable for Sum {
///     fn run(&mut self) {
///         self.total = (1..=10).sum();
///     }
/// }
///
/// let mut thread = RunnableThread::new(Sum { total: 0 });
/// thread.set_name("Summer");
/// thread.start().unwrap();
/// thread.join().unwrap();
///
/// assert_eq!(thread.state(), ThreadState::Terminated);
/// assert_eq!(thread.runnable().map(|sum| sum.total), Some(55));
/// ```
pub struct RunnableThread<R: Runnable> {
    handle: ThreadHandle,
    stack_size: Option<usize>,
    /// The runnable while it is not on its thread.
    runnable: Option<R>,
    join_handle: Option<JoinHandle<Option<R>>>,
}

impl<R: Runnable> RunnableThread<R> {
    /// Creates a thread with the default configuration and binds `runnable`.
    #[must_use]
    pub fn new(runnable: R) -> Self {
        Self::with_config(runnable, &ThreadConfig::default())
    }

    /// Creates a thread from `config` and binds `runnable`.
    ///
    /// If the runnable exposes a [`ThreadSlot`](super::ThreadSlot), it now
    /// holds this thread's handle.
    #[must_use]
    pub fn with_config(runnable: R, config: &ThreadConfig) -> Self {
        let handle = ThreadHandle::new(config.name.clone());
        if let Some(slot) = runnable.thread_slot() {
            slot.bind(handle.clone());
        }
        Self {
            handle,
            stack_size: config.stack_size,
            runnable: Some(runnable),
            join_handle: None,
        }
    }

    /// Spawns the OS thread, which runs `setup`, `run` and `teardown`.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::AlreadyStarted`] if the thread left `Created`.
    /// - [`ThreadError::Spawn`] if the OS refused to create the thread. The
    ///   failure is logged, the thread stays `Created` and keeps its runnable.
    pub fn start(&mut self) -> ThreadResult<()> {
        let name = self.name();
        if self.state() != ThreadState::Created {
            return Err(ThreadError::AlreadyStarted(name));
        }
        let Some(runnable) = self.runnable.take() else {
            return Err(ThreadError::AlreadyStarted(name));
        };

        // Handed over through a slot so a failed spawn gives the runnable back.
        let handoff = Arc::new(parking_lot::Mutex::new(Some(runnable)));
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        self.handle.set_state(ThreadState::Started);
        let handle = self.handle.clone();
        let slot = Arc::clone(&handoff);
        let spawned = builder.spawn(move || {
            let runnable = slot.lock().take()?;
            Some(thread_main(&handle, runnable))
        });

        match spawned {
            Ok(join_handle) => {
                self.join_handle = Some(join_handle);
                Ok(())
            }
            Err(source) => {
                tracing::error!(thread = %name, error = %source, "failed to spawn thread");
                self.handle.set_state(ThreadState::Created);
                self.runnable = handoff.lock().take();
                Err(ThreadError::Spawn { name, source })
            }
        }
    }

    /// Blocks until the thread finishes, then marks it `Terminated` and takes
    /// the runnable back.
    ///
    /// Joining an already joined thread is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::NotStarted`] if the thread was never started.
    /// - [`ThreadError::Panicked`] if the runnable panicked. The thread is
    ///   still `Terminated` and the runnable is lost.
    pub fn join(&mut self) -> ThreadResult<()> {
        let Some(join_handle) = self.join_handle.take() else {
            return match self.state() {
                ThreadState::Terminated => Ok(()),
                _ => Err(ThreadError::NotStarted(self.name())),
            };
        };

        let outcome = join_handle.join();
        self.handle.set_state(ThreadState::Terminated);
        match outcome {
            Ok(runnable) => {
                self.runnable = runnable;
                tracing::debug!(thread = %self.name(), "thread joined");
                Ok(())
            }
            Err(payload) => {
                let name = self.name();
                let message = panic_message(payload.as_ref());
                tracing::error!(thread = %name, panic = %message, "thread panicked");
                Err(ThreadError::Panicked { name, message })
            }
        }
    }

    /// Tears the thread down and returns the runnable, if it is still around.
    ///
    /// A live thread is joined first, unless `force_quit` is set: then it is
    /// detached and left running, and whatever it owns may leak.
    #[must_use = "the returned runnable is dropped otherwise"]
    pub fn destroy(mut self, force_quit: bool) -> Option<R> {
        if self.join_handle.is_some() {
            if force_quit {
                tracing::warn!(
                    thread = %self.name(),
                    "force-quitting thread without join, its resources may leak"
                );
                self.join_handle = None;
                return None;
            }
            if let Err(error) = self.join() {
                tracing::error!(%error, "thread ended abnormally");
            }
        }
        self.runnable.take()
    }

    /// Sets the thread name. Only allowed before [`start`](Self::start);
    /// ignored afterwards.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the thread has already started.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let started = self.state() != ThreadState::Created;
        usage_check!(
            !started,
            "set_name called after thread '{}' has already started",
            self.name()
        );
        if !started {
            self.handle.set_name(name.into());
        }
    }

    /// Returns the thread name.
    #[must_use]
    pub fn name(&self) -> String {
        self.handle.name()
    }

    /// Returns the OS thread id, once the thread is running.
    #[must_use]
    pub fn id(&self) -> Option<ThreadId> {
        self.handle.id()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.handle.state()
    }

    /// Returns the shared handle of this thread.
    #[must_use]
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    /// Returns the runnable while it is not on its thread (before start,
    /// after join).
    #[must_use]
    pub fn runnable(&self) -> Option<&R> {
        self.runnable.as_ref()
    }

    /// Mutable access to the runnable while it is not on its thread.
    pub fn runnable_mut(&mut self) -> Option<&mut R> {
        self.runnable.as_mut()
    }
}

impl<R: Runnable> fmt::Debug for RunnableThread<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnableThread")
            .field("handle", &self.handle)
            .field("live", &self.join_handle.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: Runnable> Drop for RunnableThread<R> {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        let live = self.join_handle.is_some();
        usage_check!(
            !live,
            "live thread '{}' dropped without join",
            self.name()
        );
    }
}

/// Entry point of every runnable thread.
fn thread_main<R: Runnable>(handle: &ThreadHandle, mut runnable: R) -> R {
    handle.record_current_id();
    tracing::debug!(thread = %handle.name(), "thread started");

    runnable.setup();
    handle.set_state(ThreadState::Resumed);
    runnable.run();
    handle.set_state(ThreadState::Paused);
    runnable.teardown();

    tracing::debug!(thread = %handle.name(), "thread finished");
    runnable
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadSlot;

    /// Records what it observes of its own thread at each hook.
    #[derive(Default)]
    struct Witness {
        slot: ThreadSlot,
        seen: Vec<(&'static str, ThreadState)>,
        os_name: Option<String>,
        on_own_thread: bool,
    }

    impl Witness {
        fn record(&mut self, hook: &'static str) {
            let state = self.thread().map_or(ThreadState::Created, ThreadHandle::state);
            self.seen.push((hook, state));
        }
    }

    impl Runnable for Witness {
        fn thread_slot(&self) -> Option<&ThreadSlot> {
            Some(&self.slot)
        }

        fn setup(&mut self) {
            self.record("setup");
        }

        fn run(&mut self) {
            self.record("run");
            self.os_name = thread::current().name().map(str::to_string);
            self.on_own_thread = self.thread().is_some_and(ThreadHandle::is_current);
        }

        fn teardown(&mut self) {
            self.record("teardown");
        }
    }

    struct Idle;

    impl Runnable for Idle {
        fn run(&mut self) {}
    }

    struct Boom;

    impl Runnable for Boom {
        fn run(&mut self) {
            panic!("render device lost");
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let mut thread = RunnableThread::new(Witness::default());
        assert_eq!(thread.state(), ThreadState::Created);
        assert_eq!(thread.name(), "UnnamedThread");
        assert!(thread.id().is_none());

        thread.set_name("WitnessThread");
        thread.start().unwrap();
        thread.join().unwrap();

        assert_eq!(thread.state(), ThreadState::Terminated);
        assert!(thread.id().is_some());

        let witness = thread.runnable().unwrap();
        assert_eq!(
            witness.seen,
            vec![
                ("setup", ThreadState::Started),
                ("run", ThreadState::Resumed),
                ("teardown", ThreadState::Paused),
            ]
        );
        assert_eq!(witness.os_name.as_deref(), Some("WitnessThread"));
        assert!(witness.on_own_thread);
    }

    #[test]
    fn test_slot_is_bound_at_creation() {
        let thread = RunnableThread::new(Witness::default());
        let bound = thread
            .runnable()
            .and_then(|witness| witness.thread())
            .map(ThreadHandle::name);
        assert_eq!(bound.as_deref(), Some("UnnamedThread"));
        let _ = thread.destroy(false);
    }

    #[test]
    fn test_config_applies_name_and_stack() {
        let config = ThreadConfig {
            name: "Configured".to_string(),
            stack_size: Some(256 * 1024),
        };
        let mut thread = RunnableThread::with_config(Witness::default(), &config);
        thread.start().unwrap();
        thread.join().unwrap();
        let witness = thread.runnable().unwrap();
        assert_eq!(witness.os_name.as_deref(), Some("Configured"));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut thread = RunnableThread::new(Idle);
        thread.start().unwrap();
        assert!(matches!(thread.start(), Err(ThreadError::AlreadyStarted(_))));
        thread.join().unwrap();
        assert!(matches!(thread.start(), Err(ThreadError::AlreadyStarted(_))));
    }

    #[test]
    fn test_join_without_start_fails() {
        let mut thread = RunnableThread::new(Idle);
        assert!(matches!(thread.join(), Err(ThreadError::NotStarted(_))));
    }

    #[test]
    fn test_join_twice_is_noop() {
        let mut thread = RunnableThread::new(Idle);
        thread.start().unwrap();
        thread.join().unwrap();
        thread.join().unwrap();
        assert_eq!(thread.state(), ThreadState::Terminated);
    }

    #[test]
    fn test_panicking_runnable_is_reported() {
        let mut thread = RunnableThread::new(Boom);
        thread.set_name("Renderer");
        thread.start().unwrap();
        match thread.join() {
            Err(ThreadError::Panicked { name, message }) => {
                assert_eq!(name, "Renderer");
                assert_eq!(message, "render device lost");
            }
            other => panic!("unexpected join result: {other:?}"),
        }
        assert_eq!(thread.state(), ThreadState::Terminated);
        assert!(thread.runnable().is_none());
    }

    #[test]
    fn test_destroy_joins_live_thread() {
        let mut thread = RunnableThread::new(Witness::default());
        thread.start().unwrap();
        let witness = thread.destroy(false).unwrap();
        assert_eq!(witness.seen.len(), 3);
    }

    #[test]
    fn test_destroy_force_quit_detaches() {
        let mut thread = RunnableThread::new(Idle);
        thread.start().unwrap();
        assert!(thread.destroy(true).is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "has already started")]
    fn test_rename_after_start_panics() {
        let mut thread = RunnableThread::new(Idle);
        thread.start().unwrap();
        thread.set_name("TooLate");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "dropped without join")]
    fn test_drop_live_thread_panics() {
        let mut thread = RunnableThread::new(Idle);
        thread.start().unwrap();
        drop(thread);
    }
}
