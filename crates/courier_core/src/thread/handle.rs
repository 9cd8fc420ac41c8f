//! Runnable trait, thread state and the handles shared with the OS thread.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::RwLock;

use crate::check::usage_check;

/// Lifecycle state of a [`RunnableThread`](super::RunnableThread).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    /// Not started yet. The name can still change.
    Created = 0,
    /// The OS thread exists; `setup()` is running.
    Started = 1,
    /// `run()` is executing.
    Resumed = 2,
    /// `run()` returned; `teardown()` is running or done.
    Paused = 3,
    /// Joined. Terminal.
    Terminated = 4,
}

impl ThreadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Started,
            2 => Self::Resumed,
            3 => Self::Paused,
            _ => Self::Terminated,
        }
    }
}

/// A unit of work executed by a [`RunnableThread`](super::RunnableThread).
///
/// All three hooks run on the owning thread, in order: `setup`, `run`,
/// `teardown`.
pub trait Runnable: Send + 'static {
    /// The slot that receives this runnable's thread handle, if it wants one.
    ///
    /// Implementors that need to know which thread runs them embed a
    /// [`ThreadSlot`] and return it here.
    fn thread_slot(&self) -> Option<&ThreadSlot> {
        None
    }

    /// Returns the thread this runnable is bound to.
    fn thread(&self) -> Option<&ThreadHandle> {
        self.thread_slot().and_then(ThreadSlot::get)
    }

    /// Called before [`run`](Self::run).
    fn setup(&mut self) {}

    /// The body of the thread.
    fn run(&mut self);

    /// Called after [`run`](Self::run) returns.
    fn teardown(&mut self) {}
}

struct ThreadShared {
    name: RwLock<String>,
    id: OnceLock<ThreadId>,
    state: AtomicU8,
}

/// Read-only view of a runnable thread, shared with the thread itself.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ThreadHandle {
    shared: Arc<ThreadShared>,
}

impl ThreadHandle {
    pub(crate) fn new(name: String) -> Self {
        Self {
            shared: Arc::new(ThreadShared {
                name: RwLock::new(name),
                id: OnceLock::new(),
                state: AtomicU8::new(ThreadState::Created as u8),
            }),
        }
    }

    /// Returns the thread name.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.name.read().clone()
    }

    /// Returns the OS thread id, once the thread has started.
    #[must_use]
    pub fn id(&self) -> Option<ThreadId> {
        self.shared.id.get().copied()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns whether the caller is running on this thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.id() == Some(thread::current().id())
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        self.shared.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.shared.name.write() = name;
    }

    /// Records the calling thread's id. Called once, from the thread itself.
    pub(crate) fn record_current_id(&self) {
        let _ = self.shared.id.set(thread::current().id());
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &*self.shared.name.read())
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// One-shot slot holding the handle of the thread a runnable is bound to.
#[derive(Default)]
pub struct ThreadSlot {
    handle: OnceLock<ThreadHandle>,
}

impl ThreadSlot {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handle: OnceLock::new(),
        }
    }

    /// Returns the bound thread, if any.
    #[must_use]
    pub fn get(&self) -> Option<&ThreadHandle> {
        self.handle.get()
    }

    /// Binds the slot. A runnable is bound to exactly one thread.
    pub(crate) fn bind(&self, handle: ThreadHandle) {
        let name = handle.name();
        usage_check!(
            self.handle.set(handle).is_ok(),
            "runnable bound to thread '{name}' was already bound to another thread"
        );
    }
}

impl fmt::Debug for ThreadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadSlot").field(&self.get()).finish()
    }
}
