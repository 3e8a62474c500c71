//! Direction readings and the latest-value cell shared with the renderer

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Estimator output for one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DirectionReading {
    /// Smoothed azimuth in degrees, -90 (left) to +90 (right)
    pub azimuth: f32,
    /// |azimuth| / 90
    pub confidence: f32,
    /// Smoothed mean RMS of both channels
    pub level: f32,
    /// Level is above the active threshold
    pub active: bool,
    /// Azimuth was held because the last block was silent
    pub held: bool,
}

/// State of the capture side as seen by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    /// No block has been estimated yet
    #[default]
    Starting,
    /// Blocks are flowing
    Listening,
    /// Capture device lost or missing; the reading is frozen
    DeviceUnavailable,
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerStatus::Starting => write!(f, "starting"),
            TrackerStatus::Listening => write!(f, "listening"),
            TrackerStatus::DeviceUnavailable => write!(f, "device unavailable"),
        }
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DirectionSnapshot {
    #[serde(flatten)]
    pub reading: DirectionReading,
    pub status: TrackerStatus,
    /// Number of readings published so far
    pub updates: u64,
}

/// Latest-value-wins cell between the tracker thread and the renderer.
///
/// Writers replace the whole snapshot under the lock, so readers never see a
/// partially updated value. Older snapshots are overwritten, never queued.
#[derive(Clone, Default)]
pub struct SharedDirection {
    inner: Arc<Mutex<DirectionSnapshot>>,
}

impl SharedDirection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fresh reading and mark the source as listening
    pub fn publish(&self, reading: DirectionReading) {
        let mut snapshot = self.inner.lock();
        snapshot.reading = reading;
        snapshot.status = TrackerStatus::Listening;
        snapshot.updates += 1;
    }

    /// Change the status, keeping the last reading
    pub fn set_status(&self, status: TrackerStatus) {
        self.inner.lock().status = status;
    }

    /// Copy of the latest snapshot
    pub fn snapshot(&self) -> DirectionSnapshot {
        *self.inner.lock()
    }
}
