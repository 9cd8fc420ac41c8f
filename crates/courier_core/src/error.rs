//! # Courier Error Types
//!
//! Recoverable failures only. Synchronization misuse is not an error value:
//! it is reported through usage checks (logged, fatal in debug builds).

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::mailbox::AckFlags;

/// Errors raised by [`RunnableThread`](crate::RunnableThread).
#[derive(Error, Debug)]
pub enum ThreadError {
    /// The OS refused to create the thread. The thread stays `Created`.
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Name of the thread that failed to start.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// `start()` was called on a thread that already left `Created`.
    #[error("thread '{0}' was already started")]
    AlreadyStarted(String),

    /// `join()` was called on a thread that was never started.
    #[error("thread '{0}' was never started")]
    NotStarted(String),

    /// The runnable panicked. The thread is still `Terminated` after join.
    #[error("thread '{name}' panicked: {message}")]
    Panicked {
        /// Name of the thread that panicked.
        name: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Errors raised by [`MessageTarget`](crate::MessageTarget).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    /// The requested acknowledgement did not arrive in time.
    ///
    /// The message itself stays queued and is still delivered.
    #[error("no {ack} acknowledgement within {timeout:?}")]
    AckTimeout {
        /// The acknowledgement that was still missing.
        ack: AckFlags,
        /// How long the producer waited.
        timeout: Duration,
    },

    /// The mailbox was closed; the message was dropped.
    #[error("mailbox '{0}' is closed")]
    Closed(String),
}

/// Errors raised while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for the expected schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for thread operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Result type for mailbox operations.
pub type MailboxResult<T> = Result<T, MailboxError>;

/// Result type for config loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
