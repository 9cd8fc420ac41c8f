//! # Pipeline Messages
//!
//! The two closed message sets of the pipeline:
//!
//! - [`RenderCommand`] - application thread to render thread
//! - [`ApplicationEvent`] - host (platform) thread to application thread

use std::fmt;

/// Commands consumed by the [`Renderer`](crate::Renderer).
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    /// Stop the render loop. Posted with `PROCESSED` as part of shutdown.
    Shutdown,
    /// Start recording a frame.
    BeginFrame {
        /// Monotonic frame counter, starting at 1.
        frame_index: u64,
    },
    /// Finish the frame and submit it for display.
    EndFrame(EndFrame),
    /// Finish all outstanding GPU work.
    Flush,
    /// Record one draw call into the current frame.
    Draw(DrawCall),
}

/// Submission parameters of a finished frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EndFrame {
    /// Frame being submitted, matching the preceding `BeginFrame`.
    pub frame_index: u64,
    /// Compositor flags, passed through untouched.
    pub frame_flags: u32,
    /// Number of vsync intervals the frame stays on screen.
    pub swap_interval: u32,
    /// Predicted display time, in seconds since the application started.
    pub display_time: f64,
}

/// Primitive topology of a draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Independent triangles.
    Triangles,
    /// Independent line segments.
    Lines,
    /// Points.
    Points,
}

/// An indexed draw call. Buffers are opaque ids owned by the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawCall {
    /// Primitive topology.
    pub primitive: Primitive,
    /// Vertex buffer id.
    pub vertex_buffer: u32,
    /// Index buffer id.
    pub index_buffer: u32,
    /// Number of indices to draw.
    pub num_elements: usize,
    /// Offset of the first index.
    pub draw_offset: usize,
}

/// Opaque id of a platform window surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Wraps a raw platform surface handle.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{:x}", self.0)
    }
}

/// Platform lifecycle events consumed by the
/// [`Application`](crate::Application).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApplicationEvent {
    /// The application was created.
    Created,
    /// The application came to the foreground.
    Resumed,
    /// The application went to the background.
    Paused,
    /// The application is going away. Ends the application run loop.
    Destroyed,
    /// A window surface is available.
    SurfaceCreated(SurfaceId),
    /// The window surface is gone.
    SurfaceDestroyed,
}
