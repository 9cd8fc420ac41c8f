//! # Synchronization Primitives
//!
//! ## The Problem
//!
//! ```text
//! Producer:  push message, notify          Consumer:  check queue, wait
//!
//! Plain condition variable: notify lands BEFORE wait  → LOST WAKEUP → HANG
//! ```
//!
//! ## The Solution: A Sticky Event
//!
//! ```text
//! notify_one()  ──►  state = NotifyOne  ──►  next wait() consumes it
//! notify_all()  ──►  state = NotifyAll  ──►  every current waiter returns
//! ```
//!
//! [`Event`] keeps the notification in its state until a waiter observes
//! it, and only ever mutates that state while the caller holds the guarding
//! [`Mutex`]. Holding the lock is enforced by the signatures: every `Event`
//! operation takes the caller's [`MutexGuard`].

mod event;
mod mutex;

pub use event::{Event, EventState};
pub use mutex::{Mutex, MutexGuard};
