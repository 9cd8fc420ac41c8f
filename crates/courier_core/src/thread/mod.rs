//! # Runnable Threads
//!
//! Binds a [`Runnable`] unit of work to an OS thread with an explicit
//! lifecycle:
//!
//! ```text
//! Created ──start()──► Started ──setup()──► Resumed ──run() returns──► Paused
//!                                                                        │
//!                                            Terminated ◄──join()── teardown()
//! ```
//!
//! The runnable moves onto its thread on `start()` and comes back to the
//! [`RunnableThread`] on `join()`. While it runs, it can reach its own thread
//! through the [`ThreadSlot`] bound at creation.

mod handle;
mod runnable_thread;

pub use handle::{Runnable, ThreadHandle, ThreadSlot, ThreadState};
pub use runnable_thread::RunnableThread;
