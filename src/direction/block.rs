//! Stereo sample blocks and their channel energies

use crate::error::{Channel, InvalidInput};

/// One block of stereo samples, split by channel.
///
/// Samples are normalized floats, nominally in [-1.0, 1.0]. Integer PCM is
/// converted at the capture or file boundary and never reaches this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoFrameBlock {
    /// Left channel samples
    pub left: Vec<f32>,
    /// Right channel samples
    pub right: Vec<f32>,
}

impl StereoFrameBlock {
    /// Create a block from separate channels. Lengths are checked on use.
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        Self { left, right }
    }

    /// Split interleaved frames into a stereo block.
    ///
    /// The first two channels of each frame are taken as left/right (front
    /// left and front right in the WAVE/WASAPI channel order). A trailing
    /// partial frame is ignored.
    pub fn from_interleaved(samples: &[f32], channels: usize) -> Self {
        if channels < 2 {
            return Self::default();
        }

        let frames = samples.len() / channels;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in samples.chunks_exact(channels) {
            left.push(frame[0]);
            right.push(frame[1]);
        }

        Self { left, right }
    }

    /// Same block with left and right exchanged
    pub fn swapped(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }

    /// Check the block against the estimator's input contract
    pub fn validate(&self) -> Result<usize, InvalidInput> {
        if self.left.len() != self.right.len() {
            return Err(InvalidInput::LengthMismatch {
                left: self.left.len(),
                right: self.right.len(),
            });
        }
        if self.left.is_empty() {
            return Err(InvalidInput::EmptyBlock);
        }
        if let Some(index) = self.left.iter().position(|s| !s.is_finite()) {
            return Err(InvalidInput::NonFinite {
                channel: Channel::Left,
                index,
            });
        }
        if let Some(index) = self.right.iter().position(|s| !s.is_finite()) {
            return Err(InvalidInput::NonFinite {
                channel: Channel::Right,
                index,
            });
        }
        Ok(self.left.len())
    }

    /// Mean-square energy of each channel
    pub fn energy(&self) -> Result<EnergyPair, InvalidInput> {
        let n = self.validate()? as f64;
        Ok(EnergyPair {
            left: mean_square(&self.left, n),
            right: mean_square(&self.right, n),
        })
    }
}

fn mean_square(samples: &[f32], n: f64) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / n
}

/// Per-channel mean-square energy of one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPair {
    pub left: f64,
    pub right: f64,
}

impl EnergyPair {
    /// Sum of both channel energies
    pub fn total(&self) -> f64 {
        self.left + self.right
    }

    /// Average of the two channel RMS values
    pub fn level(&self) -> f64 {
        (self.left.sqrt() + self.right.sqrt()) * 0.5
    }

    pub fn is_silent(&self, threshold: f64) -> bool {
        self.total() < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_stereo() {
        let block = StereoFrameBlock::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(block.left, vec![1.0, 3.0, 5.0]);
        assert_eq!(block.right, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_from_interleaved_surround_takes_front_pair() {
        // 6-channel frames: FL FR C LFE SL SR
        let data = [0.1, 0.2, 9.0, 9.0, 9.0, 9.0, 0.3, 0.4, 9.0, 9.0, 9.0, 9.0];
        let block = StereoFrameBlock::from_interleaved(&data, 6);
        assert_eq!(block.left, vec![0.1, 0.3]);
        assert_eq!(block.right, vec![0.2, 0.4]);
    }

    #[test]
    fn test_from_interleaved_drops_partial_frame() {
        let block = StereoFrameBlock::from_interleaved(&[1.0, 2.0, 3.0], 2);
        assert_eq!(block.left, vec![1.0]);
        assert_eq!(block.right, vec![2.0]);
    }

    #[test]
    fn test_validate() {
        let block = StereoFrameBlock::new(vec![0.0; 480], vec![0.0; 240]);
        assert_eq!(
            block.validate(),
            Err(InvalidInput::LengthMismatch {
                left: 480,
                right: 240
            })
        );

        let empty = StereoFrameBlock::default();
        assert_eq!(empty.validate(), Err(InvalidInput::EmptyBlock));

        let nan = StereoFrameBlock::new(vec![0.0, 0.0], vec![0.0, f32::NAN]);
        assert_eq!(
            nan.validate(),
            Err(InvalidInput::NonFinite {
                channel: Channel::Right,
                index: 1
            })
        );

        let ok = StereoFrameBlock::new(vec![0.5; 4], vec![-0.5; 4]);
        assert_eq!(ok.validate(), Ok(4));
    }

    #[test]
    fn test_energy() {
        let block = StereoFrameBlock::new(vec![0.5, -0.5, 0.5, -0.5], vec![1.0, 0.0, 1.0, 0.0]);
        let energy = block.energy().unwrap();
        assert!((energy.left - 0.25).abs() < 1e-12);
        assert!((energy.right - 0.5).abs() < 1e-12);
        assert!((energy.total() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_level_is_mean_rms() {
        let energy = EnergyPair {
            left: 0.25,
            right: 0.0,
        };
        assert!((energy.level() - 0.25).abs() < 1e-12);
    }
}
