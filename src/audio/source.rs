//! Frame source abstraction shared by live capture and file input

use std::time::Duration;

use crate::direction::StereoFrameBlock;
use crate::error::AudioError;

/// Anything that yields stereo blocks at a fixed sample rate.
///
/// Push-driven sources (audio callbacks) and pull-driven ones (files) look
/// the same from here: one call, at most one block.
pub trait FrameSource {
    /// Sample rate of the delivered blocks (Hz)
    fn sample_rate(&self) -> u32;

    /// Wait up to `timeout` for the next block.
    ///
    /// `Ok(None)` means nothing arrived this tick. A lost device is reported
    /// as [`AudioError::DeviceUnavailable`].
    fn next_block(&mut self, timeout: Duration) -> Result<Option<StereoFrameBlock>, AudioError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<StereoFrameBlock>, AudioError> {
        (**self).next_block(timeout)
    }
}
