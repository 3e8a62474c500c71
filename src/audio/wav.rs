//! Stereo WAV input and output

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, info};

use super::source::FrameSource;
use crate::direction::StereoFrameBlock;
use crate::error::AudioError;

/// Reads a WAV file and hands it out as stereo blocks
pub struct WavSource {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    block_frames: usize,
    position: usize,
}

impl WavSource {
    /// Open a WAV file with at least two channels
    pub fn open(path: &Path, block_frames: usize) -> Result<Self, AudioError> {
        let mut reader = WavReader::open(path).map_err(wav_error)?;
        let spec = reader.spec();
        info!(
            "WAV format: {} channels, {} Hz, {} bits",
            spec.channels, spec.sample_rate, spec.bits_per_sample
        );

        if spec.channels < 2 {
            return Err(AudioError::UnsupportedChannels(spec.channels));
        }

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(wav_error)?,
            SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_val))
                    .collect::<Result<_, _>>()
                    .map_err(wav_error)?
            }
        };

        debug!("Loaded {} samples from {}", samples.len(), path.display());

        Ok(Self {
            samples,
            channels: spec.channels as usize,
            sample_rate: spec.sample_rate,
            block_frames: block_frames.max(1),
            position: 0,
        })
    }

    /// Total length in frames
    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Total duration of the file
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames() as f64 / self.sample_rate as f64)
    }

    /// Start time of the next block
    pub fn position(&self) -> Duration {
        let frame = self.position / self.channels;
        Duration::from_secs_f64(frame as f64 / self.sample_rate as f64)
    }
}

impl Iterator for WavSource {
    type Item = StereoFrameBlock;

    /// Next block; the final one may be shorter than `block_frames`
    fn next(&mut self) -> Option<StereoFrameBlock> {
        let whole = self.total_frames() * self.channels;
        if self.position >= whole {
            return None;
        }

        let end = (self.position + self.block_frames * self.channels).min(whole);
        let block = StereoFrameBlock::from_interleaved(&self.samples[self.position..end], self.channels);
        self.position = end;
        Some(block)
    }
}

impl FrameSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, _timeout: Duration) -> Result<Option<StereoFrameBlock>, AudioError> {
        self.next().map(Some).ok_or(AudioError::StreamEnded)
    }
}

/// Writes stereo blocks to a 32-bit float WAV file
pub struct WavRecorder {
    writer: WavWriter<BufWriter<File>>,
    frames: u64,
}

impl WavRecorder {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, AudioError> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec).map_err(wav_error)?;
        Ok(Self { writer, frames: 0 })
    }

    /// Append one block, interleaving its channels
    pub fn write_block(&mut self, block: &StereoFrameBlock) -> Result<(), AudioError> {
        for (&l, &r) in block.left.iter().zip(block.right.iter()) {
            self.writer.write_sample(l).map_err(wav_error)?;
            self.writer.write_sample(r).map_err(wav_error)?;
            self.frames += 1;
        }
        Ok(())
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn finalize(self) -> Result<(), AudioError> {
        self.writer.finalize().map_err(wav_error)
    }
}

fn wav_error(e: hound::Error) -> AudioError {
    AudioError::Wav(e.to_string())
}
