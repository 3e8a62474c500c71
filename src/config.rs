//! Configuration structures for the sound-compass system

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub estimator: EstimatorConfig,
    pub display: DisplayConfig,
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.estimator.validate()?;
        self.display.validate()?;
        self.tracker.validate()
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Requested sample rate (Hz). The device mix rate wins for loopback.
    pub sample_rate: u32,
    /// Frames per stereo block handed to the estimator
    pub block_size_frames: usize,
    /// Device name substring (None = default device)
    pub device: Option<String>,
    /// Capture an output device (loopback) instead of an input device
    pub loopback: bool,
    /// Capacity of the capture -> estimator block queue
    pub queue_blocks: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size_frames: 2048,
            device: None,
            loopback: true,
            queue_blocks: 32,
        }
    }
}

impl AudioConfig {
    /// Duration of one block at the given sample rate
    pub fn block_period(&self, sample_rate: u32) -> Duration {
        Duration::from_secs_f64(self.block_size_frames as f64 / sample_rate.max(1) as f64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("audio.sample_rate", self.sample_rate));
        }
        if self.block_size_frames == 0 {
            return Err(ConfigError::invalid(
                "audio.block_size_frames",
                self.block_size_frames,
            ));
        }
        if self.queue_blocks == 0 {
            return Err(ConfigError::invalid("audio.queue_blocks", self.queue_blocks));
        }
        Ok(())
    }
}

/// Direction estimator configuration.
///
/// Samples are expected as normalized floats in [-1.0, 1.0]; thresholds below
/// are expressed on that scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Below this sum of channel mean-square energies a block counts as silent
    pub silence_threshold: f32,
    /// Explicit EMA weight of the newest angle, in (0, 1]. 1.0 disables smoothing.
    pub smoothing_alpha: Option<f32>,
    /// Time for a step change to reach 90% of its final value (used when
    /// `smoothing_alpha` is unset)
    pub settle_time_ms: u64,
    /// Exponent of the balance -> angle curve (1.0 = linear)
    pub angle_curve_gamma: f32,
    /// Smoothed level at which the audio counts as active
    pub active_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 1e-6,
            smoothing_alpha: None,
            settle_time_ms: 200,
            angle_curve_gamma: 1.0,
            active_threshold: 0.015,
        }
    }
}

impl EstimatorConfig {
    /// Resolve the smoothing weight for blocks of the given duration
    pub fn resolve_alpha(&self, block_period: Duration) -> f32 {
        match self.smoothing_alpha {
            Some(alpha) => alpha,
            None => crate::direction::alpha_for_settling(
                Duration::from_millis(self.settle_time_ms),
                block_period,
            ),
        }
    }

    /// Check the estimator settings against their allowed ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "estimator.silence_threshold",
                self.silence_threshold,
            ));
        }
        if let Some(alpha) = self.smoothing_alpha {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::invalid("estimator.smoothing_alpha", alpha));
            }
        }
        if !self.angle_curve_gamma.is_finite() || self.angle_curve_gamma <= 0.0 {
            return Err(ConfigError::invalid(
                "estimator.angle_curve_gamma",
                self.angle_curve_gamma,
            ));
        }
        if !self.active_threshold.is_finite() || self.active_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "estimator.active_threshold",
                self.active_threshold,
            ));
        }
        Ok(())
    }
}

/// Compass display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Output format
    pub format: OutputFormat,
    /// Render tick interval (ms)
    pub refresh_ms: u64,
    /// Angles within +/- this many degrees are labelled "front"
    pub center_deadband_deg: f32,
    /// Width of the needle gauge in characters
    pub gauge_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            refresh_ms: 80,
            center_deadband_deg: 10.0,
            gauge_width: 41,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_ms == 0 {
            return Err(ConfigError::invalid("display.refresh_ms", self.refresh_ms));
        }
        if !(0.0..90.0).contains(&self.center_deadband_deg) {
            return Err(ConfigError::invalid(
                "display.center_deadband_deg",
                self.center_deadband_deg,
            ));
        }
        if self.gauge_width < 11 || self.gauge_width % 2 == 0 {
            return Err(ConfigError::invalid("display.gauge_width", self.gauge_width));
        }
        Ok(())
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Single compass line
    Text,
    /// JSON object per update
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::invalid("display.format", other)),
        }
    }
}

/// Background tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delay before reopening an unavailable device (ms)
    pub reconnect_delay_ms: u64,
    /// How long to wait for a block before re-checking the stop flag (ms)
    pub poll_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 2000,
            poll_ms: 100,
        }
    }
}

impl TrackerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_ms == 0 {
            return Err(ConfigError::invalid("tracker.poll_ms", self.poll_ms));
        }
        Ok(())
    }
}
