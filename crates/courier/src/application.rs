//! # Application Thread
//!
//! [`Application`] turns platform lifecycle events into frames:
//!
//! ```text
//!  AppHandle ──ApplicationEvent──► Application ──RenderCommand──► Renderer ──► FrameSink
//!  (host thread)                   (app thread)                  (render thread)
//! ```
//!
//! Each iteration of the run loop flushes the application mailbox, updates
//! whether frames should be presented (resumed and a surface is attached),
//! and if so posts one `BeginFrame`/`EndFrame` pair. While idle the flush
//! blocks; while presenting it does not.
//!
//! A render thread that dies closes its mailbox. The application then joins
//! it, records why in [`AppReport::render_error`] and keeps handling host
//! events without presenting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courier_core::{
    AckFlags, MessageHandler, MessageTarget, Runnable, RunnableThread, ThreadConfig, ThreadSlot,
};

use crate::commands::{ApplicationEvent, EndFrame, RenderCommand, SurfaceId};
use crate::config::PipelineConfig;
use crate::renderer::{FrameSink, RenderStats, Renderer};

/// The render thread together with the producer side of its mailbox.
struct RenderLink<S: FrameSink> {
    thread: RunnableThread<Renderer<S>>,
    mailbox: Arc<MessageTarget<RenderCommand>>,
}

/// What an application did over its lifetime, available after it stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppReport {
    /// Frames posted to the renderer.
    pub frames_presented: u64,
    /// Lifecycle events handled.
    pub events_handled: u64,
    /// Renderer counters, if the render thread ran and was joined.
    pub render: Option<RenderStats>,
    /// Why the render thread did not start or did not stop cleanly.
    pub render_error: Option<String>,
}

/// Application thread runnable and [`ApplicationEvent`] consumer.
pub struct Application<S: FrameSink> {
    mailbox: Arc<MessageTarget<ApplicationEvent>>,
    slot: ThreadSlot,
    render_config: ThreadConfig,
    swap_interval: u32,
    /// `None` presents as fast as the renderer acknowledges.
    frame_period: Option<Duration>,
    /// Handed to the renderer in `setup`.
    pending_sink: Option<S>,
    renderer: Option<RenderLink<S>>,
    surface: Option<SurfaceId>,
    resumed: bool,
    presenting: bool,
    exit_requested: bool,
    frame_counter: u64,
    frames_presented: Arc<AtomicU64>,
    started_at: Instant,
    next_frame_at: Instant,
    report: AppReport,
}

impl<S: FrameSink> Application<S> {
    /// Creates an application that will render into `sink`.
    #[must_use]
    pub fn new(config: &PipelineConfig, sink: S) -> Self {
        let now = Instant::now();
        Self {
            mailbox: Arc::new(MessageTarget::with_label("application")),
            slot: ThreadSlot::new(),
            render_config: config.render_thread.clone(),
            swap_interval: config.swap_interval,
            frame_period: config.frame_period(),
            pending_sink: Some(sink),
            renderer: None,
            surface: None,
            resumed: false,
            presenting: false,
            exit_requested: false,
            frame_counter: 0,
            frames_presented: Arc::new(AtomicU64::new(0)),
            started_at: now,
            next_frame_at: now,
            report: AppReport::default(),
        }
    }

    /// Returns a producer handle to the application's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> Arc<MessageTarget<ApplicationEvent>> {
        Arc::clone(&self.mailbox)
    }

    /// Returns a live counter of presented frames, readable from any thread.
    #[must_use]
    pub fn frames_presented(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames_presented)
    }

    /// Returns whether frames are currently being presented.
    #[must_use]
    pub fn is_presenting(&self) -> bool {
        self.presenting
    }

    /// Returns the attached surface.
    #[must_use]
    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Returns the lifetime report. Complete once the thread has stopped.
    #[must_use]
    pub fn report(&self) -> &AppReport {
        &self.report
    }

    /// Whether the next flush should wait for a host event: nothing to
    /// present, or nobody to present to.
    fn waits_for_host(&self) -> bool {
        !self.presenting || self.renderer.is_none()
    }

    /// Presents while resumed with a surface, stops presenting otherwise.
    fn update_presentation(&mut self) {
        let should_present = self.resumed && self.surface.is_some();
        if should_present && !self.presenting {
            tracing::info!("Entering presentation on {:?}", self.surface);
            self.presenting = true;
            self.next_frame_at = Instant::now();
        } else if !should_present && self.presenting {
            tracing::info!("Leaving presentation");
            self.presenting = false;
            // The renderer is done with the surface once this returns.
            if let Some(link) = &self.renderer {
                link.mailbox.post_message(RenderCommand::Flush, AckFlags::PROCESSED);
            }
        }
    }

    fn present_frame(&mut self) {
        let Some(link) = &self.renderer else {
            return;
        };

        self.frame_counter += 1;
        let frame_index = self.frame_counter;
        let display_time = self.started_at.elapsed().as_secs_f64()
            + self.frame_period.map_or(0.0, |period| period.as_secs_f64());

        link.mailbox
            .post_message(RenderCommand::BeginFrame { frame_index }, AckFlags::NONE);
        link.mailbox.post_message(
            RenderCommand::EndFrame(EndFrame {
                frame_index,
                frame_flags: 0,
                swap_interval: self.swap_interval,
                display_time,
            }),
            AckFlags::RECEIVED,
        );
        if link.mailbox.is_closed() {
            tracing::error!("Render thread died during frame {frame_index}");
            self.stop_renderer();
            return;
        }

        self.report.frames_presented += 1;
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
        self.pace();
    }

    /// Sleeps until the next frame slot. Never catches up on missed slots.
    fn pace(&mut self) {
        let Some(period) = self.frame_period else {
            return;
        };
        self.next_frame_at += period;
        let now = Instant::now();
        if self.next_frame_at > now {
            thread::sleep(self.next_frame_at - now);
        } else {
            self.next_frame_at = now;
        }
    }

    fn start_renderer(&mut self) {
        let Some(sink) = self.pending_sink.take() else {
            return;
        };
        let renderer = Renderer::new(sink);
        let mailbox = renderer.mailbox();
        let mut thread = RunnableThread::with_config(renderer, &self.render_config);
        match thread.start() {
            Ok(()) => self.renderer = Some(RenderLink { thread, mailbox }),
            Err(error) => {
                tracing::error!("Render thread failed to start: {error}");
                self.report.render_error = Some(error.to_string());
            }
        }
    }

    fn stop_renderer(&mut self) {
        let Some(RenderLink { mut thread, mailbox }) = self.renderer.take() else {
            return;
        };
        // Returns at once if the render thread already died.
        mailbox.post_message(RenderCommand::Shutdown, AckFlags::PROCESSED);
        if let Err(error) = thread.join() {
            tracing::error!("Render thread did not stop cleanly: {error}");
            self.report.render_error = Some(error.to_string());
        }
        self.report.render = thread.destroy(false).map(|renderer| renderer.stats());
    }
}

impl<S: FrameSink> Runnable for Application<S> {
    fn thread_slot(&self) -> Option<&ThreadSlot> {
        Some(&self.slot)
    }

    fn setup(&mut self) {
        self.started_at = Instant::now();
        self.start_renderer();
        tracing::debug!("Application setup completed");
    }

    fn run(&mut self) {
        let mailbox = Arc::clone(&self.mailbox);
        while !self.exit_requested {
            // Idle: block until the host sends something.
            mailbox.flush_messages(self, self.waits_for_host());
            if self.exit_requested {
                break;
            }
            self.update_presentation();
            if self.presenting {
                self.present_frame();
            }
        }
    }

    fn teardown(&mut self) {
        self.presenting = false;
        self.stop_renderer();
        tracing::debug!(
            "Application teardown completed after {} frames",
            self.report.frames_presented
        );
    }
}

impl<S: FrameSink> MessageHandler<ApplicationEvent> for Application<S> {
    fn process_message(&mut self, message: ApplicationEvent) {
        self.report.events_handled += 1;
        match message {
            ApplicationEvent::Created => tracing::debug!("Application created"),
            ApplicationEvent::Resumed => {
                tracing::debug!("Application resumed");
                self.resumed = true;
            }
            ApplicationEvent::Paused => {
                tracing::debug!("Application paused");
                self.resumed = false;
            }
            ApplicationEvent::Destroyed => {
                tracing::debug!("Application shutdown requested");
                self.exit_requested = true;
            }
            ApplicationEvent::SurfaceCreated(surface) => {
                tracing::debug!("Application surface created: {surface}");
                self.surface = Some(surface);
            }
            ApplicationEvent::SurfaceDestroyed => {
                tracing::debug!("Application surface destroyed");
                self.surface = None;
            }
        }
    }
}
