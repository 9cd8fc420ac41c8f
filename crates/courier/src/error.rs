//! Pipeline error types.

use courier_core::{ConfigError, ThreadError};
use thiserror::Error;

/// Errors raised while driving the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A pipeline thread failed to start, or panicked.
    #[error("thread error: {0}")]
    Thread(#[from] ThreadError),

    /// The configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The application thread stopped without returning its state.
    #[error("application state was lost")]
    ApplicationLost,
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
