//! # COURIER Core
//!
//! Thread primitives for passing typed commands between long-lived worker
//! threads (for example a logic thread feeding a render thread):
//!
//! - [`Mutex`] / [`Event`] - exclusive lock plus a tri-state wait/notify
//!   protocol that never loses a notification sent before anyone waits
//! - [`Runnable`] / [`RunnableThread`] - a unit of work bound to an OS thread
//!   with an explicit lifecycle
//! - [`MessageTarget`] - a multi-producer/single-consumer mailbox with
//!   optional synchronous acknowledgements
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use courier_core::{AckFlags, MessageHandler, MessageTarget};
//!
//! enum Command {
//!     Add(u32),
//!     Reset,
//! }
//!
//! struct Counter(u32);
//!
//! impl MessageHandler<Command> for Counter {
//!     fn process_message(&mut self, message: Command) {
//!         match message {
//!             Command::Add(n) => self.0 += n,
//!             Command::Reset => self.0 = 0,
//!         }
//!     }
//! }
//!
//! let mailbox = Arc::new(MessageTarget::new());
//! mailbox.post_message(Command::Add(2), AckFlags::NONE);
//! mailbox.post_message(Command::Add(3), AckFlags::NONE);
//!
//! let mut counter = Counter(0);
//! assert_eq!(mailbox.flush_messages(&mut counter, false), 2);
//! assert_eq!(counter.0, 5);
//! mailbox.post_message(Command::Reset, AckFlags::NONE);
//! mailbox.flush_messages(&mut counter, false);
//! assert_eq!(counter.0, 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod check;

pub mod config;
pub mod error;
pub mod mailbox;
pub mod sync;
pub mod thread;

pub use config::ThreadConfig;
pub use error::{ConfigError, MailboxError, ThreadError};
pub use mailbox::{AckFlags, MailboxStats, MessageHandler, MessageTarget};
pub use sync::{Event, EventState, Mutex, MutexGuard};
pub use thread::{Runnable, RunnableThread, ThreadHandle, ThreadSlot, ThreadState};
