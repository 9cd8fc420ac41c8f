//! # Typed Mailboxes
//!
//! A [`MessageTarget`] is one [`Mutex`](crate::Mutex)-guarded FIFO plus three
//! [`Event`](crate::Event)s:
//!
//! ```text
//!  producer A ──┐                                   ┌── sent          (consumer idles on it)
//!  producer B ──┼─► post_message ─► [ m1 m2 m3 ] ─► ├── received_ack  (after dequeue)
//!  producer C ──┘                        │          └── processed_ack (after the handler)
//!                                        ▼
//!                         flush_messages ─► MessageHandler::process_message
//! ```
//!
//! Each envelope that asked for an acknowledgement shares an `Arc`'d ack
//! state with its producer. The consumer marks it and broadcasts on the ack
//! event; every waiting producer re-checks its own envelope. The state is
//! freed when the last of the two lets go, whichever side that is.
//!
//! ## Shutdown
//!
//! Post the shutdown message with [`AckFlags::PROCESSED`], join the consumer
//! thread, then drop the mailbox.

mod flags;
mod target;

pub use flags::AckFlags;
pub use target::{MailboxStats, MessageHandler, MessageTarget};
