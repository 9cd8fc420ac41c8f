//! Host-side driver of the application lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use courier_core::{AckFlags, MessageTarget, RunnableThread, ThreadState};

use crate::application::{AppReport, Application};
use crate::commands::{ApplicationEvent, SurfaceId};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::renderer::FrameSink;

/// Owns the application thread and forwards platform callbacks to it.
///
/// Every call blocks until the application thread has handled the event.
/// Finish with [`destroy`](Self::destroy): dropping the handle instead
/// leaves a live thread behind, which is a usage bug.
///
/// ## Usage
///
/// ```rust
/// use courier::{AppHandle, NullSink, PipelineConfig, SurfaceId};
///
/// let config = PipelineConfig {
///     target_fps: 0,
///     ..PipelineConfig::default()
/// };
/// let mut app = AppHandle::create(&config, NullSink).unwrap();
/// app.resume();
/// app.set_surface(Some(SurfaceId::new(1)));
/// while app.frames_presented() < 3 {
///     std::thread::yield_now();
/// }
/// app.set_surface(None);
/// app.pause();
///
/// let report = app.destroy().unwrap();
/// assert!(report.frames_presented >= 3);
/// ```
pub struct AppHandle<S: FrameSink> {
    thread: RunnableThread<Application<S>>,
    mailbox: Arc<MessageTarget<ApplicationEvent>>,
    /// Host-side view of the attached surface.
    surface: Option<SurfaceId>,
    frames_presented: Arc<AtomicU64>,
}

impl<S: FrameSink> AppHandle<S> {
    /// Starts the application thread (which starts the render thread) and
    /// delivers [`ApplicationEvent::Created`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Thread`] if the application thread could not
    /// be spawned.
    pub fn create(config: &PipelineConfig, sink: S) -> PipelineResult<Self> {
        let application = Application::new(config, sink);
        let mailbox = application.mailbox();
        let frames_presented = application.frames_presented();

        let mut thread = RunnableThread::with_config(application, &config.app_thread);
        thread.start()?;

        let handle = Self {
            thread,
            mailbox,
            surface: None,
            frames_presented,
        };
        handle.send(ApplicationEvent::Created);
        Ok(handle)
    }

    /// Delivers [`ApplicationEvent::Resumed`].
    pub fn resume(&self) {
        self.send(ApplicationEvent::Resumed);
    }

    /// Delivers [`ApplicationEvent::Paused`].
    pub fn pause(&self) {
        self.send(ApplicationEvent::Paused);
    }

    /// Attaches `surface`, or detaches the current one with `None`.
    ///
    /// Returns the surface that was replaced, which the caller may now
    /// release. Setting the surface that is already attached does nothing
    /// and returns `None`.
    pub fn set_surface(&mut self, surface: Option<SurfaceId>) -> Option<SurfaceId> {
        if self.surface == surface {
            return None;
        }
        let replaced = self.surface.take();
        if replaced.is_some() {
            self.send(ApplicationEvent::SurfaceDestroyed);
        }
        if let Some(surface) = surface {
            self.send(ApplicationEvent::SurfaceCreated(surface));
            self.surface = Some(surface);
        }
        replaced
    }

    /// Returns the attached surface.
    #[must_use]
    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Returns the number of frames presented so far.
    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented.load(Ordering::Relaxed)
    }

    /// Returns the application thread state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.thread.state()
    }

    /// Delivers [`ApplicationEvent::Destroyed`], joins the application
    /// thread and returns its report.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Thread`] if the application thread panicked.
    /// - [`PipelineError::ApplicationLost`] if its state did not come back.
    pub fn destroy(self) -> PipelineResult<AppReport> {
        let Self {
            mut thread,
            mailbox,
            ..
        } = self;
        mailbox.post_message(ApplicationEvent::Destroyed, AckFlags::PROCESSED);
        thread.join()?;
        let application = thread.destroy(false).ok_or(PipelineError::ApplicationLost)?;
        Ok(application.report().clone())
    }

    fn send(&self, event: ApplicationEvent) {
        self.mailbox.post_message(event, AckFlags::PROCESSED);
    }
}
