//! The [`MessageTarget`] mailbox.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::check::usage_check;
use crate::error::{MailboxError, MailboxResult};
use crate::sync::{Event, Mutex, MutexGuard};

use super::flags::AckFlags;

/// Label of mailboxes created without one.
const DEFAULT_LABEL: &str = "mailbox";

/// Consumer side of a mailbox: handles one message at a time.
///
/// `M` is normally a closed enum, matched exhaustively.
pub trait MessageHandler<M> {
    /// Handles one message. Called with the mailbox lock held, so calls never
    /// overlap and the handler must not post to the same mailbox.
    fn process_message(&mut self, message: M);
}

/// Counters of a mailbox since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailboxStats {
    /// Messages posted.
    pub posted: u64,
    /// Messages dispatched to a handler.
    pub processed: u64,
    /// Completed `flush_messages*` calls.
    pub flushes: u64,
}

/// Acknowledgement state shared by an envelope and its waiting producer.
struct Ack {
    requested: AckFlags,
    /// Only written with the mailbox lock held.
    acked: AtomicU8,
}

impl Ack {
    fn new(requested: AckFlags) -> Self {
        Self {
            requested,
            acked: AtomicU8::new(AckFlags::NONE.bits()),
        }
    }

    fn is_acked(&self, flag: AckFlags) -> bool {
        AckFlags::from_bits(self.acked.load(Ordering::Relaxed)).contains(flag)
    }

    fn mark(&self, flag: AckFlags) {
        self.acked.fetch_or(flag.bits(), Ordering::Relaxed);
    }
}

struct Envelope<M> {
    payload: M,
    /// Present only when the producer asked for an acknowledgement.
    ack: Option<Arc<Ack>>,
}

struct Queue<M> {
    envelopes: VecDeque<Envelope<M>>,
    stats: MailboxStats,
    /// Set once by `close`; never cleared.
    closed: bool,
}

/// Multi-producer, single-consumer mailbox with optional acknowledgements.
///
/// Producers on any thread call [`post_message`](Self::post_message). The
/// single consumer thread calls [`flush_messages`](Self::flush_messages) at
/// each iteration of its run loop and receives every pending message, in
/// post order per producer, through its [`MessageHandler`].
///
/// Dropping a mailbox that still holds messages is a usage bug, fatal in
/// debug builds: drain it first.
///
/// A consumer that dies must [`close`](Self::close) its mailbox, or
/// producers waiting for an acknowledgement block forever.
pub struct MessageTarget<M> {
    queue: Mutex<Queue<M>>,
    /// Signalled on every post; the consumer waits on it when idle.
    sent: Event,
    received_ack: Event,
    processed_ack: Event,
    label: String,
}

impl<M> MessageTarget<M> {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::with_label(DEFAULT_LABEL)
    }

    /// Creates an empty mailbox with a label used in logs.
    #[must_use]
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(Queue {
                envelopes: VecDeque::new(),
                stats: MailboxStats::default(),
                closed: false,
            }),
            sent: Event::new(),
            received_ack: Event::new(),
            processed_ack: Event::new(),
            label: label.into(),
        }
    }

    /// Returns the mailbox label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the number of messages waiting to be dispatched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().envelopes.len()
    }

    /// Returns whether no message is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().envelopes.is_empty()
    }

    /// Returns a snapshot of the mailbox counters.
    #[must_use]
    pub fn stats(&self) -> MailboxStats {
        self.queue.lock().stats
    }

    /// Returns whether the mailbox was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    /// Closes the mailbox for good. Returns the number of pending messages
    /// dropped.
    ///
    /// Every producer waiting for an acknowledgement that has not happened
    /// yet is released, later posts are dropped and flushes no longer
    /// block. Closing twice is a no-op.
    pub fn close(&self) -> usize {
        let mut queue = self.queue.lock();
        if queue.closed {
            return 0;
        }
        queue.closed = true;
        let dropped = queue.envelopes.len();
        queue.envelopes.clear();
        self.sent.notify_all(&queue);
        self.received_ack.notify_all(&queue);
        self.processed_ack.notify_all(&queue);
        tracing::warn!(mailbox = %self.label, dropped, "mailbox closed");
        dropped
    }

    /// Queues `message` and wakes the consumer.
    ///
    /// With [`AckFlags::NONE`] this returns immediately. Otherwise it blocks
    /// until every requested acknowledgement has happened:
    ///
    /// - `RECEIVED`: the consumer dequeued the message. The mailbox stays
    ///   locked for the whole drain, so the producer only wakes once that
    ///   drain is over, after this message's handler and every message
    ///   queued behind it.
    /// - `PROCESSED`: the handler returned for the message.
    ///
    /// The two differ when the handler panics and the mailbox is closed:
    /// `RECEIVED` was still granted, `PROCESSED` never is. A post to a
    /// closed mailbox, or one closed while waiting, returns with the
    /// message dropped. There is no timeout; see
    /// [`post_message_timeout`](Self::post_message_timeout).
    ///
    /// # Panics
    ///
    /// In debug builds, panics if called from inside this mailbox's handler.
    pub fn post_message(&self, message: M, flags: AckFlags) {
        // Without a deadline the only failure is a closed mailbox.
        if let Err(error) = self.post(message, flags, None) {
            tracing::debug!(mailbox = %self.label, %error, "post abandoned");
        }
    }

    /// Like [`post_message`](Self::post_message) but waits at most `timeout`
    /// for the acknowledgements.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::AckTimeout`] naming the acknowledgement that did not
    ///   arrive in time. The message stays queued and is still delivered.
    /// - [`MailboxError::Closed`] if the mailbox was closed before the
    ///   acknowledgements arrived.
    pub fn post_message_timeout(
        &self,
        message: M,
        flags: AckFlags,
        timeout: Duration,
    ) -> MailboxResult<()> {
        let result = self.post(message, flags, Some(timeout));
        if let Err(MailboxError::AckTimeout { ack, .. }) = &result {
            tracing::warn!(mailbox = %self.label, %ack, ?timeout, "acknowledgement timed out");
        }
        result
    }

    /// Dispatches every pending message to `handler`, front to back.
    ///
    /// If `blocking` is set and the mailbox is empty, first waits for a
    /// message to arrive or for the mailbox to close. The mailbox stays
    /// locked for the whole drain, so producers block until it is done.
    /// Returns the number of messages dispatched.
    ///
    /// Only the consumer thread calls this.
    pub fn flush_messages<H>(&self, handler: &mut H, blocking: bool) -> usize
    where
        H: MessageHandler<M> + ?Sized,
    {
        let mut queue = self.queue.lock();
        if blocking {
            while queue.envelopes.is_empty() && !queue.closed {
                self.sent.wait(&mut queue);
            }
        }
        self.drain(&mut queue, handler)
    }

    /// Like a blocking [`flush_messages`](Self::flush_messages) but waits at
    /// most `timeout` for a first message. Returns 0 if none arrived.
    pub fn flush_messages_timeout<H>(&self, handler: &mut H, timeout: Duration) -> usize
    where
        H: MessageHandler<M> + ?Sized,
    {
        let deadline = Instant::now().checked_add(timeout);
        let mut queue = self.queue.lock();
        while queue.envelopes.is_empty() && !queue.closed {
            if !Self::wait_on(&self.sent, &mut queue, deadline) {
                break;
            }
        }
        self.drain(&mut queue, handler)
    }

    /// Enqueues and waits for the requested acks, up to `timeout`.
    fn post(&self, message: M, flags: AckFlags, timeout: Option<Duration>) -> MailboxResult<()> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(self.closed_error());
        }
        let ack = (!flags.is_empty()).then(|| Arc::new(Ack::new(flags)));
        queue.envelopes.push_back(Envelope {
            payload: message,
            ack: ack.clone(),
        });
        queue.stats.posted += 1;
        self.sent.notify_one(&queue);

        let Some(ack) = ack else {
            return Ok(());
        };
        for flag in [AckFlags::RECEIVED, AckFlags::PROCESSED] {
            if !flags.contains(flag) {
                continue;
            }
            let event = self.ack_event(flag);
            while !ack.is_acked(flag) {
                if queue.closed {
                    return Err(self.closed_error());
                }
                let woken = Self::wait_on(event, &mut queue, deadline);
                if !woken && !ack.is_acked(flag) && !queue.closed {
                    return Err(MailboxError::AckTimeout {
                        ack: flag,
                        timeout: timeout.unwrap_or_default(),
                    });
                }
            }
        }
        Ok(())
    }

    fn closed_error(&self) -> MailboxError {
        MailboxError::Closed(self.label.clone())
    }

    /// Waits on `event`, bounded by `deadline` if there is one.
    ///
    /// Returns `false` on timeout.
    fn wait_on(
        event: &Event,
        queue: &mut MutexGuard<'_, Queue<M>>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => event.wait_until(queue, deadline),
            None => {
                event.wait(queue);
                true
            }
        }
    }

    fn drain<H>(&self, queue: &mut MutexGuard<'_, Queue<M>>, handler: &mut H) -> usize
    where
        H: MessageHandler<M> + ?Sized,
    {
        let mut dispatched = 0;
        while let Some(Envelope { payload, ack }) = queue.envelopes.pop_front() {
            if let Some(ack) = &ack {
                self.acknowledge(queue, ack, AckFlags::RECEIVED);
            }
            handler.process_message(payload);
            if let Some(ack) = &ack {
                self.acknowledge(queue, ack, AckFlags::PROCESSED);
            }
            queue.stats.processed += 1;
            dispatched += 1;
        }
        queue.stats.flushes += 1;
        dispatched
    }

    fn acknowledge(&self, queue: &MutexGuard<'_, Queue<M>>, ack: &Ack, flag: AckFlags) {
        if ack.requested.contains(flag) {
            ack.mark(flag);
            // Producers waiting for other envelopes share this event.
            self.ack_event(flag).notify_all(queue);
        }
    }

    fn ack_event(&self, flag: AckFlags) -> &Event {
        if flag == AckFlags::RECEIVED {
            &self.received_ack
        } else {
            &self.processed_ack
        }
    }
}

impl<M> Default for MessageTarget<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MessageTarget<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageTarget")
            .field("label", &self.label)
            .field("locked", &self.queue.is_locked())
            .finish_non_exhaustive()
    }
}

impl<M> Drop for MessageTarget<M> {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        let pending = self.queue.get_mut().envelopes.len();
        usage_check!(
            pending == 0,
            "mailbox '{}' destroyed with {pending} undelivered messages",
            self.label
        );
    }
}
