//! Audio input: live capture, WAV files and block assembly

pub mod buffer;
pub mod capture;
pub mod source;
pub mod wav;

pub use buffer::FrameAccumulator;
pub use capture::{DeviceInfo, DeviceKind, LoopbackCapture};
pub use source::FrameSource;
pub use wav::{WavRecorder, WavSource};
