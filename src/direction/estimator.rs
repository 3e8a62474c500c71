//! Stereo energy balance to compass angle

use std::time::Duration;
use tracing::trace;

use super::block::{EnergyPair, StereoFrameBlock};
use super::reading::DirectionReading;
use crate::config::EstimatorConfig;
use crate::error::{ConfigError, InvalidInput};

/// Largest magnitude of an azimuth, in degrees
pub const MAX_AZIMUTH: f32 = 90.0;

/// Fraction of a step change still outstanding once the settle time has passed
const SETTLE_RESIDUAL: f64 = 0.1;

/// Smallest smoothing weight accepted, keeps the filter from freezing
const MIN_ALPHA: f32 = 1e-4;

/// Normalized right-minus-left energy difference in [-1, 1].
///
/// Zero when both channels carry the same energy, including when both are zero.
pub fn balance(energy: EnergyPair) -> f64 {
    let total = energy.total();
    if total <= 0.0 {
        return 0.0;
    }
    ((energy.right - energy.left) / total).clamp(-1.0, 1.0)
}

/// Map a balance to degrees: `sign(b) * 90 * |b|^gamma`.
///
/// Odd and monotonic for any `gamma > 0`; `gamma = 1` is the linear `b * 90`.
/// A gamma that is not a positive number falls back to the linear curve.
pub fn map_balance(balance: f64, gamma: f32) -> f32 {
    if balance == 0.0 || balance.is_nan() {
        return 0.0;
    }
    let gamma = if gamma.is_finite() && gamma > 0.0 {
        gamma
    } else {
        1.0
    };
    let balance = balance.clamp(-1.0, 1.0);
    let magnitude = balance.abs().powf(gamma as f64);
    (MAX_AZIMUTH as f64 * magnitude).copysign(balance) as f32
}

/// Unsmoothed angle of one block
pub fn raw_angle(block: &StereoFrameBlock, gamma: f32) -> Result<f32, InvalidInput> {
    Ok(map_balance(balance(block.energy()?), gamma))
}

/// EMA weight such that a step reaches 90% of its final value after `settle`
/// worth of blocks of length `block_period`.
///
/// Returns 1.0 (no smoothing) when the settle time is not longer than a block.
pub fn alpha_for_settling(settle: Duration, block_period: Duration) -> f32 {
    let settle = settle.as_secs_f64();
    let period = block_period.as_secs_f64();
    if period <= 0.0 || settle <= period {
        return 1.0;
    }

    let steps = settle / period;
    let alpha = 1.0 - SETTLE_RESIDUAL.powf(1.0 / steps);
    (alpha as f32).clamp(MIN_ALPHA, 1.0)
}

/// Turns stereo blocks into a smoothed left/right azimuth.
///
/// Holds one scalar of history (`previous_smoothed`), so one instance should
/// be created per capture session and fed blocks in order.
#[derive(Debug, Clone)]
pub struct DirectionEstimator {
    silence_threshold: f64,
    gamma: f32,
    alpha: f32,
    active_threshold: f32,
    previous_smoothed: f32,
    level: f32,
    held: bool,
}

impl DirectionEstimator {
    /// Create an estimator for blocks of the given duration
    pub fn new(config: &EstimatorConfig, block_period: Duration) -> Result<Self, ConfigError> {
        Self::with_alpha(config, config.resolve_alpha(block_period))
    }

    /// Create an estimator with an explicit smoothing weight.
    ///
    /// Fails when `config` holds an out-of-range value (e.g. `gamma <= 0`).
    pub fn with_alpha(config: &EstimatorConfig, alpha: f32) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            silence_threshold: config.silence_threshold as f64,
            gamma: config.angle_curve_gamma,
            alpha: clamp_alpha(alpha),
            active_threshold: config.active_threshold,
            previous_smoothed: 0.0,
            level: 0.0,
            held: false,
        })
    }

    /// Current smoothing weight
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Change the smoothing weight, keeping history
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = clamp_alpha(alpha);
    }

    /// Estimate the azimuth of one block.
    ///
    /// Silent blocks return the previous estimate unchanged. Malformed blocks
    /// fail with [`InvalidInput`] and leave the estimator untouched.
    pub fn estimate(&mut self, block: &StereoFrameBlock) -> Result<f32, InvalidInput> {
        self.observe(block).map(|reading| reading.azimuth)
    }

    /// Estimate one block and return the full reading
    pub fn observe(&mut self, block: &StereoFrameBlock) -> Result<DirectionReading, InvalidInput> {
        let energy = block.energy()?;

        self.level = self.smooth(energy.level() as f32, self.level);

        if energy.is_silent(self.silence_threshold) {
            trace!(
                "Silent block (energy {:.3e}), holding {:+.1}",
                energy.total(),
                self.previous_smoothed
            );
            self.held = true;
            return Ok(self.reading());
        }

        let angle = map_balance(balance(energy), self.gamma);
        self.previous_smoothed =
            self.smooth(angle, self.previous_smoothed).clamp(-MAX_AZIMUTH, MAX_AZIMUTH);
        self.held = false;

        trace!(
            "Block energy L={:.3e} R={:.3e} angle={:+.1} smoothed={:+.1}",
            energy.left,
            energy.right,
            angle,
            self.previous_smoothed
        );

        Ok(self.reading())
    }

    /// Reading for the current state without consuming a block
    pub fn reading(&self) -> DirectionReading {
        let azimuth = self.current();
        DirectionReading {
            azimuth,
            confidence: (azimuth.abs() / MAX_AZIMUTH).min(1.0),
            level: self.level,
            active: self.level >= self.active_threshold,
            held: self.held,
        }
    }

    /// Last smoothed azimuth
    pub fn current(&self) -> f32 {
        self.previous_smoothed
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.previous_smoothed = 0.0;
        self.level = 0.0;
        self.held = false;
    }

    fn smooth(&self, value: f32, previous: f32) -> f32 {
        self.alpha * value + (1.0 - self.alpha) * previous
    }
}

fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        return 1.0;
    }
    alpha.clamp(MIN_ALPHA, 1.0)
}
