//! Configuration types for sequence frame playback.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lowest frame rate the tick is armed with.
pub const MIN_FPS: f32 = 1.0;

fn default_fps() -> f32 {
    60.0
}

/// Playback configuration owned by the pipeline controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Texture package used by `play()` and `load_configured()`.
    #[serde(default)]
    pub package_path: Option<PathBuf>,
    /// Target frames per second, clamped to at least [`MIN_FPS`].
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Wrap around at the end of the sequence.
    #[serde(default)]
    pub loop_playback: bool,
    /// Keep the last frame visible when playback ends or stops.
    #[serde(default)]
    pub keep_last_frame_visible: bool,
    /// Play from the last frame towards frame 0. Read on load.
    #[serde(default)]
    pub reverse: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            package_path: None,
            fps: default_fps(),
            loop_playback: false,
            keep_last_frame_visible: false,
            reverse: false,
        }
    }
}

impl PlaybackConfig {
    /// Frame rate actually used for the tick.
    #[inline]
    pub fn effective_fps(&self) -> f32 {
        self.fps.max(MIN_FPS)
    }

    /// Tick period derived from the clamped frame rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.effective_fps())
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() {
            return Err(ConfigError::InvalidFrameRate(self.fps));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Frame rate must be finite, got {0}")]
    InvalidFrameRate(f32),
}
