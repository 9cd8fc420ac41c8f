//! # COURIER Frame Pipeline
//!
//! An application thread and a render thread talking through
//! [`courier_core`] mailboxes:
//!
//! - [`AppHandle`] - host-side driver; forwards lifecycle callbacks and
//!   waits until each one is handled
//! - [`Application`] - turns lifecycle events into frames
//! - [`Renderer`] - executes [`RenderCommand`]s against a [`FrameSink`]
//!
//! ## Shutdown Order
//!
//! ```text
//! AppHandle::destroy ─► Destroyed (PROCESSED) ─► app run loop exits
//!                                                   │
//!     Application::teardown ─► Shutdown (PROCESSED) ─► render loop exits
//!                          └─► join render thread ─► join app thread ─► AppReport
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod application;
pub mod commands;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod renderer;

pub use application::{AppReport, Application};
pub use commands::{ApplicationEvent, DrawCall, EndFrame, Primitive, RenderCommand, SurfaceId};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use lifecycle::AppHandle;
pub use renderer::{
    FrameRecord, FrameSink, NullSink, RecordingSink, RenderStats, Renderer, RendererState,
};
