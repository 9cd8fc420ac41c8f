//! Pipeline configuration.
//!
//! ```toml
//! target_fps = 90
//! swap_interval = 1
//!
//! [app_thread]
//! name = "AppThread"
//!
//! [render_thread]
//! name = "RenderThread"
//! stack_size = 8388608
//! ```

use std::path::Path;
use std::time::Duration;

use courier_core::config::{load_toml, parse_toml};
use courier_core::error::ConfigResult;
use courier_core::ThreadConfig;
use serde::{Deserialize, Serialize};

/// Settings of the application and render threads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Application thread settings.
    pub app_thread: ThreadConfig,
    /// Render thread settings.
    pub render_thread: ThreadConfig,
    /// Presentation rate in frames per second. `0` presents as fast as the
    /// renderer keeps up.
    pub target_fps: u32,
    /// Vsync intervals per frame, passed to every `EndFrame`.
    pub swap_interval: u32,
}

impl PipelineConfig {
    /// Parses a pipeline config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text is not a valid config.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        parse_toml(text)
    }

    /// Loads a pipeline config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        load_toml(path)
    }

    /// Time between two frames, or `None` when unpaced.
    #[must_use]
    pub fn frame_period(&self) -> Option<Duration> {
        (self.target_fps > 0).then(|| Duration::from_secs(1) / self.target_fps)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_thread: ThreadConfig::named("AppThread"),
            render_thread: ThreadConfig::named("RenderThread"),
            target_fps: 72,
            swap_interval: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.app_thread.name, "AppThread");
        assert_eq!(config.render_thread.name, "RenderThread");
        assert_eq!(config.swap_interval, 1);
        assert_eq!(config.frame_period(), Some(Duration::from_secs(1) / 72));
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            "target_fps = 0\n\n[render_thread]\nstack_size = 1048576\n",
        )
        .unwrap();
        assert_eq!(config.frame_period(), None);
        assert_eq!(config.render_thread.name, "UnnamedThread");
        assert_eq!(config.render_thread.stack_size, Some(1_048_576));
        assert_eq!(config.app_thread.name, "AppThread");
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(PipelineConfig::from_toml_str("swap_interval = \"one\"").is_err());
    }
}
