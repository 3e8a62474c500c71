//! Assembling fixed-size stereo blocks from interleaved callback data

use crate::direction::StereoFrameBlock;

/// Collects interleaved samples and emits stereo blocks of exactly
/// `block_frames` frames.
///
/// Only the first two channels of each frame are kept. Samples that do not
/// complete a frame are carried over to the next push.
pub struct FrameAccumulator {
    channels: usize,
    block_frames: usize,
    left: Vec<f32>,
    right: Vec<f32>,
    carry: Vec<f32>,
}

impl FrameAccumulator {
    /// Create an accumulator. `channels` must be at least 2.
    pub fn new(channels: usize, block_frames: usize) -> Self {
        let block_frames = block_frames.max(1);
        Self {
            channels: channels.max(2),
            block_frames,
            left: Vec::with_capacity(block_frames),
            right: Vec::with_capacity(block_frames),
            carry: Vec::with_capacity(channels),
        }
    }

    /// Append interleaved samples and return every block completed by them
    pub fn push_interleaved(&mut self, samples: &[f32]) -> Vec<StereoFrameBlock> {
        let mut blocks = Vec::new();
        let mut rest = samples;

        // Finish a frame split across callbacks
        if !self.carry.is_empty() {
            let needed = self.channels - self.carry.len();
            let take = needed.min(rest.len());
            self.carry.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.carry.len() < self.channels {
                return blocks;
            }
            let (l, r) = (self.carry[0], self.carry[1]);
            self.carry.clear();
            self.push_frame(l, r, &mut blocks);
        }

        let mut frames = rest.chunks_exact(self.channels);
        for frame in &mut frames {
            self.push_frame(frame[0], frame[1], &mut blocks);
        }
        self.carry.extend_from_slice(frames.remainder());

        blocks
    }

    /// Frames waiting for the current block to fill
    pub fn pending_frames(&self) -> usize {
        self.left.len()
    }

    fn push_frame(&mut self, l: f32, r: f32, blocks: &mut Vec<StereoFrameBlock>) {
        self.left.push(l);
        self.right.push(r);

        if self.left.len() == self.block_frames {
            let left = std::mem::replace(&mut self.left, Vec::with_capacity(self.block_frames));
            let right = std::mem::replace(&mut self.right, Vec::with_capacity(self.block_frames));
            blocks.push(StereoFrameBlock::new(left, right));
        }
    }
}
