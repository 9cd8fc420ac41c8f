//! # Configuration
//!
//! Settings are plain `serde` structs with defaults for every field, so a
//! config file only needs to name what it changes. Files are TOML and are
//! read once at startup.
//!
//! ```toml
//! name = "RenderThread"
//! stack_size = 4194304
//! ```

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Name given to threads that were never named.
pub const DEFAULT_THREAD_NAME: &str = "UnnamedThread";

/// Creation settings for a [`RunnableThread`](crate::RunnableThread).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Thread name, visible to debuggers and in logs.
    pub name: String,
    /// Stack size in bytes. `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl ThreadConfig {
    /// Default settings with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a thread config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        parse_toml(text)
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

/// Parses any config type from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text does not match `T`.
pub fn parse_toml<T: DeserializeOwned>(text: &str) -> ConfigResult<T> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses a TOML config file.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read.
/// - [`ConfigError::Parse`] if its contents do not match `T`.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_toml(&text)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
