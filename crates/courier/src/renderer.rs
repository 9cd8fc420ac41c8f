//! # Render Thread
//!
//! [`Renderer`] owns the render thread's mailbox. Its run loop blocks on the
//! mailbox and hands every command to a [`FrameSink`], the seam where a real
//! GPU backend plugs in, until it processes [`RenderCommand::Shutdown`].

use std::sync::Arc;
use std::thread;

use courier_core::{MessageHandler, MessageTarget, Runnable, ThreadSlot};
use crossbeam_channel::{Receiver, Sender};

use crate::commands::{DrawCall, EndFrame, RenderCommand};

/// Receives the GPU work of the render thread.
///
/// All calls come from the render thread, in command order.
pub trait FrameSink: Send + 'static {
    /// Called once on the render thread before the first command.
    fn attach(&mut self) {}

    /// Starts recording frame `frame_index`.
    fn begin_frame(&mut self, frame_index: u64);

    /// Records a draw call into the current frame.
    fn draw(&mut self, call: &DrawCall);

    /// Submits the current frame for display.
    fn submit_frame(&mut self, frame: &EndFrame);

    /// Waits for outstanding GPU work.
    fn flush(&mut self) {}

    /// Called once on the render thread after the last command.
    fn detach(&mut self) {}
}

/// A sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn begin_frame(&mut self, _frame_index: u64) {}

    fn draw(&mut self, _call: &DrawCall) {}

    fn submit_frame(&mut self, _frame: &EndFrame) {}
}

/// One call observed by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum FrameRecord {
    /// The sink was attached to the render thread.
    Attached,
    /// `begin_frame(frame_index)`.
    Begin(u64),
    /// `draw(call)`.
    Draw(DrawCall),
    /// `submit_frame(frame)`.
    Submit(EndFrame),
    /// `flush()`.
    Flush,
    /// The sink was detached from the render thread.
    Detached,
}

/// A sink that forwards every call over a channel.
#[derive(Clone, Debug)]
pub struct RecordingSink {
    records: Sender<FrameRecord>,
}

impl RecordingSink {
    /// Creates a sink and the receiving end of its records.
    #[must_use]
    pub fn channel() -> (Self, Receiver<FrameRecord>) {
        let (records, receiver) = crossbeam_channel::unbounded();
        (Self { records }, receiver)
    }

    fn record(&self, record: FrameRecord) {
        // Nobody listening any more is fine.
        let _ = self.records.send(record);
    }
}

impl FrameSink for RecordingSink {
    fn attach(&mut self) {
        self.record(FrameRecord::Attached);
    }

    fn begin_frame(&mut self, frame_index: u64) {
        self.record(FrameRecord::Begin(frame_index));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.record(FrameRecord::Draw(*call));
    }

    fn submit_frame(&mut self, frame: &EndFrame) {
        self.record(FrameRecord::Submit(*frame));
    }

    fn flush(&mut self) {
        self.record(FrameRecord::Flush);
    }

    fn detach(&mut self) {
        self.record(FrameRecord::Detached);
    }
}

/// Where the renderer is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    /// Constructed, not running yet.
    Created,
    /// Running its command loop.
    Started,
    /// Torn down.
    Stopped,
}

/// Counters of a renderer's work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// `BeginFrame` commands handled.
    pub frames_begun: u64,
    /// `EndFrame` commands handled.
    pub frames_submitted: u64,
    /// `Draw` commands handled.
    pub draw_calls: u64,
    /// `Flush` commands handled.
    pub flushes: u64,
}

/// Render thread runnable and [`RenderCommand`] consumer.
pub struct Renderer<S: FrameSink> {
    mailbox: Arc<MessageTarget<RenderCommand>>,
    slot: ThreadSlot,
    sink: S,
    state: RendererState,
    /// Frame opened by the last `BeginFrame`, if any.
    open_frame: Option<u64>,
    exit_requested: bool,
    stats: RenderStats,
}

impl<S: FrameSink> Renderer<S> {
    /// Creates a renderer that feeds `sink`.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            mailbox: Arc::new(MessageTarget::with_label("render")),
            slot: ThreadSlot::new(),
            sink,
            state: RendererState::Created,
            open_frame: None,
            exit_requested: false,
            stats: RenderStats::default(),
        }
    }

    /// Returns a producer handle to the renderer's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> Arc<MessageTarget<RenderCommand>> {
        Arc::clone(&self.mailbox)
    }

    /// Returns the renderer state.
    #[must_use]
    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Returns the work counters.
    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Returns the sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: FrameSink> Drop for Renderer<S> {
    fn drop(&mut self) {
        // A panicking sink takes the render thread down; release whoever
        // waits on a command it will never handle.
        if thread::panicking() {
            self.mailbox.close();
        }
    }
}

impl<S: FrameSink> Runnable for Renderer<S> {
    fn thread_slot(&self) -> Option<&ThreadSlot> {
        Some(&self.slot)
    }

    fn setup(&mut self) {
        self.sink.attach();
        self.state = RendererState::Started;
        tracing::debug!("Renderer started");
    }

    fn run(&mut self) {
        let mailbox = Arc::clone(&self.mailbox);
        while !self.exit_requested && !mailbox.is_closed() {
            mailbox.flush_messages(self, true);
        }
    }

    fn teardown(&mut self) {
        self.sink.detach();
        self.state = RendererState::Stopped;
        tracing::debug!(
            "Renderer stopped after {} frames",
            self.stats.frames_submitted
        );
    }
}

impl<S: FrameSink> MessageHandler<RenderCommand> for Renderer<S> {
    fn process_message(&mut self, message: RenderCommand) {
        match message {
            RenderCommand::Shutdown => self.exit_requested = true,
            RenderCommand::BeginFrame { frame_index } => {
                self.open_frame = Some(frame_index);
                self.sink.begin_frame(frame_index);
                self.stats.frames_begun += 1;
            }
            RenderCommand::EndFrame(frame) => {
                if self.open_frame != Some(frame.frame_index) {
                    tracing::warn!(
                        "EndFrame {} does not match the open frame {:?}",
                        frame.frame_index,
                        self.open_frame
                    );
                }
                self.open_frame = None;
                self.sink.submit_frame(&frame);
                self.stats.frames_submitted += 1;
            }
            RenderCommand::Flush => {
                self.sink.flush();
                self.stats.flushes += 1;
            }
            RenderCommand::Draw(call) => {
                self.sink.draw(&call);
                self.stats.draw_calls += 1;
            }
        }
    }
}
