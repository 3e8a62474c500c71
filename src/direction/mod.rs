//! Left/right direction estimation from stereo energy

pub mod block;
pub mod estimator;
pub mod reading;

pub use block::{EnergyPair, StereoFrameBlock};
pub use estimator::{
    alpha_for_settling, balance, map_balance, raw_angle, DirectionEstimator, MAX_AZIMUTH,
};
pub use reading::{DirectionReading, DirectionSnapshot, SharedDirection, TrackerStatus};
