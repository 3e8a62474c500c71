//! Loopback audio capture using cpal
//!
//! On Windows (WASAPI) an input stream built on an output device captures
//! whatever that device is playing. Elsewhere, point `audio.device` at a
//! monitor source and set `audio.loopback = false`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Sample, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::buffer::FrameAccumulator;
use super::source::FrameSource;
use crate::config::AudioConfig;
use crate::direction::StereoFrameBlock;
use crate::error::AudioError;

/// Kind of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Playback device, captured through loopback
    Output,
    /// Recording device
    Input,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Output => write!(f, "output"),
            DeviceKind::Input => write!(f, "input"),
        }
    }
}

/// A device that can be captured from
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub is_default: bool,
}

/// Stereo capture handle delivering fixed-size blocks
pub struct LoopbackCapture {
    config: AudioConfig,
    host: Host,
    device: Option<Device>,
    stream_config: Option<SupportedStreamConfig>,
    stream: Option<Stream>,
    block_sender: Sender<StereoFrameBlock>,
    block_receiver: Receiver<StereoFrameBlock>,
    is_running: Arc<AtomicBool>,
    device_lost: Arc<AtomicBool>,
    actual_sample_rate: u32,
}

impl LoopbackCapture {
    /// Create a new capture instance
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let (sender, receiver) = bounded(config.queue_blocks.max(1));

        Ok(Self {
            config,
            host,
            device: None,
            stream_config: None,
            stream: None,
            block_sender: sender,
            block_receiver: receiver,
            is_running: Arc::new(AtomicBool::new(false)),
            device_lost: Arc::new(AtomicBool::new(false)),
            actual_sample_rate: 0,
        })
    }

    /// Create, initialize and start a capture in one go
    pub fn open(config: AudioConfig) -> Result<Self, AudioError> {
        let mut capture = Self::new(config)?;
        capture.init()?;
        capture.start()?;
        Ok(capture)
    }

    /// List output and input devices
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        let default_output = self.host.default_output_device().and_then(|d| d.name().ok());
        let default_input = self.host.default_input_device().and_then(|d| d.name().ok());

        let mut devices = Vec::new();

        let outputs = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
        for device in outputs {
            if let Ok(name) = device.name() {
                let is_default = default_output.as_deref() == Some(name.as_str());
                devices.push(DeviceInfo {
                    name,
                    kind: DeviceKind::Output,
                    is_default,
                });
            }
        }

        let inputs = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
        for device in inputs {
            if let Ok(name) = device.name() {
                let is_default = default_input.as_deref() == Some(name.as_str());
                devices.push(DeviceInfo {
                    name,
                    kind: DeviceKind::Input,
                    is_default,
                });
            }
        }

        Ok(devices)
    }

    /// Select the device and read its stream configuration
    pub fn init(&mut self) -> Result<(), AudioError> {
        let device = self.select_device()?;
        let kind = self.device_kind();

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using {} device: {}", kind, device_name);

        // Loopback captures whatever format the device is rendering in
        let supported = match kind {
            DeviceKind::Output => device.default_output_config(),
            DeviceKind::Input => device.default_input_config(),
        }
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        debug!(
            "Device config: channels={}, sample_rate={}, format={:?}",
            supported.channels(),
            supported.sample_rate().0,
            supported.sample_format()
        );

        let channels = supported.channels();
        if channels < 2 {
            return Err(AudioError::UnsupportedChannels(channels));
        }
        if channels > 2 {
            warn!(
                "Device mixes {} channels; using front left/right only, surround output skews the estimate",
                channels
            );
        }

        self.actual_sample_rate = supported.sample_rate().0;
        if self.actual_sample_rate != self.config.sample_rate {
            info!(
                "Device runs at {} Hz (requested {} Hz), using device rate",
                self.actual_sample_rate, self.config.sample_rate
            );
        }

        self.stream_config = Some(supported);
        self.device = Some(device);
        Ok(())
    }

    /// Get the actual sample rate of the capture device
    pub fn actual_sample_rate(&self) -> u32 {
        self.actual_sample_rate
    }

    /// Start capturing audio
    pub fn start(&mut self) -> Result<(), AudioError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AudioError::DeviceConfig("Device not initialized".to_string()))?;
        let supported = self
            .stream_config
            .as_ref()
            .ok_or_else(|| AudioError::DeviceConfig("Device not initialized".to_string()))?;

        let config = supported.config();
        let shared = CallbackShared {
            channels: supported.channels() as usize,
            block_frames: self.config.block_size_frames,
            sender: self.block_sender.clone(),
            is_running: self.is_running.clone(),
            device_lost: self.device_lost.clone(),
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(device, &config, shared),
            SampleFormat::I16 => build_stream::<i16>(device, &config, shared),
            SampleFormat::U16 => build_stream::<u16>(device, &config, shared),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        self.device_lost.store(false, Ordering::Relaxed);
        self.is_running.store(true, Ordering::Relaxed);

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        self.stream = Some(stream);

        info!(
            "Audio capture started ({} frames per block)",
            self.config.block_size_frames
        );
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        if self.stream.take().is_some() {
            info!("Audio capture stopped");
        }
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    fn device_kind(&self) -> DeviceKind {
        if self.config.loopback {
            DeviceKind::Output
        } else {
            DeviceKind::Input
        }
    }

    fn select_device(&self) -> Result<Device, AudioError> {
        match (self.device_kind(), self.config.device.as_deref()) {
            (DeviceKind::Output, None) => self
                .host
                .default_output_device()
                .ok_or(AudioError::NoOutputDevice),
            (DeviceKind::Input, None) => self
                .host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice),
            (kind, Some(name)) => self.find_device_by_name(kind, name),
        }
    }

    fn find_device_by_name(&self, kind: DeviceKind, name: &str) -> Result<Device, AudioError> {
        let devices: Vec<Device> = match kind {
            DeviceKind::Output => self.host.output_devices().map(|d| d.collect::<Vec<_>>()),
            DeviceKind::Input => self.host.input_devices().map(|d| d.collect::<Vec<_>>()),
        }
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name.contains(name) {
                    return Ok(device);
                }
            }
        }

        Err(AudioError::DeviceNotFound(name.to_string()))
    }
}

impl FrameSource for LoopbackCapture {
    fn sample_rate(&self) -> u32 {
        self.actual_sample_rate
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<StereoFrameBlock>, AudioError> {
        if self.device_lost.load(Ordering::Relaxed) {
            return Err(AudioError::DeviceUnavailable(
                "stream reported the device as gone".to_string(),
            ));
        }

        // Loopback delivers nothing while no application is playing
        match self.block_receiver.recv_timeout(timeout) {
            Ok(block) => Ok(Some(block)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(AudioError::DeviceUnavailable(
                "capture channel closed".to_string(),
            )),
        }
    }
}

impl Drop for LoopbackCapture {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// State moved into the stream callbacks
struct CallbackShared {
    channels: usize,
    block_frames: usize,
    sender: Sender<StereoFrameBlock>,
    is_running: Arc<AtomicBool>,
    device_lost: Arc<AtomicBool>,
}

/// Build an input stream for the given sample type
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    shared: CallbackShared,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let CallbackShared {
        channels,
        block_frames,
        sender,
        is_running,
        device_lost,
    } = shared;

    let mut accumulator = FrameAccumulator::new(channels, block_frames);
    let mut scratch: Vec<f32> = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if !is_running.load(Ordering::Relaxed) {
                return;
            }

            scratch.clear();
            scratch.extend(data.iter().map(|s| f32::from_sample(*s)));

            for block in accumulator.push_interleaved(&scratch) {
                if sender.try_send(block).is_err() {
                    warn!("Block queue full - dropping audio block");
                }
            }
        },
        move |err| {
            error!("Audio stream error: {}", err);
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                device_lost.store(true, Ordering::Relaxed);
            }
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_creation() {
        let capture = LoopbackCapture::new(AudioConfig::default());
        assert!(capture.is_ok());
    }

    #[test]
    fn test_list_devices_does_not_panic() {
        let capture = LoopbackCapture::new(AudioConfig::default()).unwrap();
        // Result depends on the machine's audio stack
        let _ = capture.list_devices();
    }

    #[test]
    fn test_start_requires_init() {
        let mut capture = LoopbackCapture::new(AudioConfig::default()).unwrap();
        assert!(matches!(capture.start(), Err(AudioError::DeviceConfig(_))));
        assert!(!capture.is_running());
    }

    #[test]
    fn test_idle_capture_yields_nothing() {
        let mut capture = LoopbackCapture::new(AudioConfig::default()).unwrap();
        let block = capture.next_block(Duration::from_millis(5)).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn test_queued_blocks_are_delivered_in_order() {
        let mut capture = LoopbackCapture::new(AudioConfig::default()).unwrap();
        let first = StereoFrameBlock::new(vec![0.1], vec![0.2]);
        let second = StereoFrameBlock::new(vec![0.3], vec![0.4]);
        capture.block_sender.send(first.clone()).unwrap();
        capture.block_sender.send(second.clone()).unwrap();

        assert_eq!(capture.next_block(Duration::ZERO).unwrap(), Some(first));
        assert_eq!(capture.next_block(Duration::ZERO).unwrap(), Some(second));
    }

    #[test]
    fn test_lost_device_reported() {
        let mut capture = LoopbackCapture::new(AudioConfig::default()).unwrap();
        capture.device_lost.store(true, Ordering::Relaxed);
        let err = capture.next_block(Duration::ZERO).unwrap_err();
        assert!(err.is_device_unavailable());
    }
}
