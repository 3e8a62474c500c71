//! Custom error types for the sound-compass system

use thiserror::Error;

/// Main error type for the sound-compass system
#[derive(Error, Debug)]
pub enum CompassError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Estimation error: {0}")]
    Estimate(#[from] InvalidInput),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thread error: {0}")]
    Thread(String),
}

/// Audio capture and frame source errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device configuration: {0}")]
    DeviceConfig(String),

    #[error("Device has {0} channel(s), stereo capture needs at least 2")]
    UnsupportedChannels(u16),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Stream playback error: {0}")]
    StreamPlay(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The device went away or never delivered a stream. Callers hold the
    /// last direction and retry.
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio stream ended")]
    StreamEnded,

    #[error("WAV error: {0}")]
    Wav(String),
}

impl AudioError {
    /// Whether the error means "no new blocks for now" rather than a setup
    /// problem. A named device that does not exist, a mono device, an
    /// unsupported format or a bad file are not transient.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            AudioError::NoOutputDevice
                | AudioError::NoInputDevice
                | AudioError::DeviceConfig(_)
                | AudioError::DeviceUnavailable(_)
                | AudioError::StreamBuild(_)
                | AudioError::StreamPlay(_)
        )
    }
}

/// Which channel of a stereo block an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Left => write!(f, "left"),
            Channel::Right => write!(f, "right"),
        }
    }
}

/// Malformed stereo block handed to the estimator.
///
/// This is always an upstream contract violation, never a runtime condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("invalid input: block is empty")]
    EmptyBlock,

    #[error("invalid input: channel lengths differ (left {left}, right {right})")]
    LengthMismatch { left: usize, right: usize },

    #[error("invalid input: non-finite sample in {channel} channel at index {index}")]
    NonFinite { channel: Channel, index: usize },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: impl ToString) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompassError>;
