//! Sound Compass
//!
//! Captures the stereo audio a machine is playing (loopback), estimates how
//! far left or right the dominant sound sits from the energy difference
//! between the channels, and shows that as a live compass angle.
//!
//! # Architecture
//!
//! - `audio`: loopback capture (cpal), WAV input/output, block assembly
//! - `direction`: the stereo energy -> azimuth estimator and its shared state
//! - `tracker`: background capture -> estimate loop with device recovery
//! - `output`: compass rendering (text or JSON)
//! - `control`: stop signal and Esc handling
//! - `config`: configuration structures
//! - `error`: error types
//!
//! Only left/right bias is recoverable from two channels: front and back are
//! indistinguishable, and HRTF-processed or surround mixes break the model.
//!
//! # Example
//!
//! ```
//! use sound_compass::{DirectionEstimator, EstimatorConfig, StereoFrameBlock};
//!
//! // alpha = 1.0: no smoothing, every block stands alone
//! let mut estimator = DirectionEstimator::with_alpha(&EstimatorConfig::default(), 1.0).unwrap();
//!
//! let block = StereoFrameBlock::new(vec![0.0; 480], vec![1.0; 480]);
//! assert_eq!(estimator.estimate(&block).unwrap(), 90.0);
//! ```

pub mod audio;
pub mod config;
pub mod control;
pub mod direction;
pub mod error;
pub mod output;
pub mod tracker;

// Re-exports for convenience
pub use audio::{FrameSource, LoopbackCapture, WavRecorder, WavSource};
pub use config::{AudioConfig, Config, DisplayConfig, EstimatorConfig, OutputFormat, TrackerConfig};
pub use control::{KeyboardExit, StopSignal};
pub use direction::{
    DirectionEstimator, DirectionReading, DirectionSnapshot, EnergyPair, SharedDirection,
    StereoFrameBlock, TrackerStatus,
};
pub use error::{AudioError, CompassError, ConfigError, InvalidInput, Result};
pub use output::{ConsoleRenderer, Renderer};
pub use tracker::{DirectionTracker, TrackerStats};
