//! Background capture -> estimate loop
//!
//! The tracker thread owns the frame source and the estimator, and publishes
//! every reading into a [`SharedDirection`] for the renderer to pick up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::FrameSource;
use crate::config::Config;
use crate::direction::{DirectionEstimator, DirectionSnapshot, SharedDirection, TrackerStatus};
use crate::error::{AudioError, CompassError, Result};

/// Longest single sleep while waiting, so stop requests are noticed quickly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Counters for one tracking session
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    /// Blocks estimated
    pub blocks: u64,
    /// Blocks that were below the silence threshold
    pub silent_blocks: u64,
    /// Malformed blocks dropped
    pub rejected_blocks: u64,
    /// Times the source was reopened after being lost
    pub reconnects: u64,
    pub elapsed: Duration,
}

impl TrackerStats {
    pub fn log_summary(&self) {
        info!(
            "Session complete: {} blocks ({} silent, {} rejected), {} reconnects, duration: {:.1}s",
            self.blocks,
            self.silent_blocks,
            self.rejected_blocks,
            self.reconnects,
            self.elapsed.as_secs_f32()
        );
    }
}

/// Handle to the tracker thread
pub struct DirectionTracker {
    shared: SharedDirection,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<TrackerStats>>>,
}

impl DirectionTracker {
    /// Start tracking on a dedicated thread.
    ///
    /// `open_source` runs on that thread, once at start and again after every
    /// device loss, so sources that are not `Send` (cpal streams) work.
    ///
    /// A source that cannot be opened for a reason other than the device
    /// being unavailable (wrong device name, mono device, unreadable file)
    /// ends the worker before the first block; the error comes back from
    /// [`DirectionTracker::stop`].
    pub fn spawn<S, F>(config: &Config, open_source: F) -> Result<Self>
    where
        S: FrameSource,
        F: FnMut() -> std::result::Result<S, AudioError> + Send + 'static,
    {
        config.validate()?;
        let estimator = DirectionEstimator::with_alpha(&config.estimator, 1.0)?;

        let shared = SharedDirection::new();
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            config: config.clone(),
            shared: shared.clone(),
            running: running.clone(),
            estimator,
        };

        let handle = thread::Builder::new()
            .name("direction-tracker".to_string())
            .spawn(move || worker.run(open_source))
            .map_err(|e| CompassError::Thread(e.to_string()))?;

        Ok(Self {
            shared,
            running,
            handle: Some(handle),
        })
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> DirectionSnapshot {
        self.shared.snapshot()
    }

    /// Whether the worker has exited on its own (source ended or failed)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the worker and collect its statistics, or the error that ended it
    pub fn stop(mut self) -> Result<TrackerStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<TrackerStats> {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return Ok(TrackerStats::default());
        };
        handle
            .join()
            .map_err(|_| CompassError::Thread("direction tracker thread panicked".to_string()))?
    }
}

impl Drop for DirectionTracker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Direction tracker stopped with error: {}", e);
        }
    }
}

struct Worker {
    config: Config,
    shared: SharedDirection,
    running: Arc<AtomicBool>,
    estimator: DirectionEstimator,
}

impl Worker {
    fn run<S, F>(mut self, mut open_source: F) -> Result<TrackerStats>
    where
        S: FrameSource,
        F: FnMut() -> std::result::Result<S, AudioError>,
    {
        let start = Instant::now();
        let mut stats = TrackerStats::default();
        let mut failed_attempts: u32 = 0;
        let mut opened: u64 = 0;

        let poll = Duration::from_millis(self.config.tracker.poll_ms);
        let reconnect_delay = Duration::from_millis(self.config.tracker.reconnect_delay_ms);

        while self.is_running() {
            let mut source = match open_source() {
                Ok(source) => source,
                // Setup errors before the first stream will not go away by retrying
                Err(e) if opened == 0 && !e.is_device_unavailable() => {
                    error!("Cannot open audio source: {}", e);
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
                Err(e) => {
                    failed_attempts += 1;
                    self.shared.set_status(TrackerStatus::DeviceUnavailable);
                    if failed_attempts == 1 {
                        warn!(
                            "Audio source unavailable: {}. Holding last direction, retrying every {:?}",
                            e, reconnect_delay
                        );
                    } else {
                        debug!("Audio source still unavailable (attempt {}): {}", failed_attempts, e);
                    }
                    self.sleep(reconnect_delay);
                    continue;
                }
            };

            opened += 1;
            if opened > 1 {
                stats.reconnects += 1;
                info!("Audio source reconnected");
            }
            failed_attempts = 0;

            let status = if self.shared.snapshot().updates > 0 {
                TrackerStatus::Listening
            } else {
                TrackerStatus::Starting
            };
            self.shared.set_status(status);

            // History survives reconnects; only the rate-dependent weight changes
            let block_period = self.config.audio.block_period(source.sample_rate());
            self.estimator
                .set_alpha(self.config.estimator.resolve_alpha(block_period));
            info!(
                "Estimating at {} Hz, block period {:.1} ms, smoothing alpha {:.3}",
                source.sample_rate(),
                block_period.as_secs_f64() * 1000.0,
                self.estimator.alpha()
            );

            let mut lost = false;
            while self.is_running() {
                match source.next_block(poll) {
                    Ok(Some(block)) => match self.estimator.observe(&block) {
                        Ok(reading) => {
                            stats.blocks += 1;
                            if reading.held {
                                stats.silent_blocks += 1;
                            }
                            self.shared.publish(reading);
                        }
                        Err(e) => {
                            stats.rejected_blocks += 1;
                            error!("Rejected audio block: {}", e);
                        }
                    },
                    Ok(None) => {}
                    Err(AudioError::StreamEnded) => {
                        info!("Audio source ended");
                        self.running.store(false, Ordering::SeqCst);
                    }
                    Err(e) => {
                        if e.is_device_unavailable() {
                            warn!("{}; holding last direction", e);
                        } else {
                            error!("Audio source failed: {}", e);
                        }
                        self.shared.set_status(TrackerStatus::DeviceUnavailable);
                        lost = true;
                        break;
                    }
                }
            }

            drop(source);
            if lost {
                self.sleep(reconnect_delay);
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::StereoFrameBlock;
    use std::collections::VecDeque;

    struct ScriptedSource {
        steps: VecDeque<std::result::Result<Option<StereoFrameBlock>, AudioError>>,
    }

    impl ScriptedSource {
        fn new(
            steps: Vec<std::result::Result<Option<StereoFrameBlock>, AudioError>>,
        ) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn sample_rate(&self) -> u32 {
            48000
        }

        fn next_block(
            &mut self,
            timeout: Duration,
        ) -> std::result::Result<Option<StereoFrameBlock>, AudioError> {
            match self.steps.pop_front() {
                Some(step) => step,
                None => {
                    thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.estimator.smoothing_alpha = Some(1.0);
        config.tracker.poll_ms = 5;
        config.tracker.reconnect_delay_ms = 5;
        config
    }

    fn block(left: f32, right: f32) -> StereoFrameBlock {
        StereoFrameBlock::new(vec![left; 480], vec![right; 480])
    }

    fn lost() -> AudioError {
        AudioError::DeviceUnavailable("unplugged".to_string())
    }

    fn spawn_with(sources: Vec<ScriptedSource>) -> DirectionTracker {
        let mut sources: VecDeque<ScriptedSource> = sources.into();
        DirectionTracker::spawn(&test_config(), move || sources.pop_front().ok_or_else(lost))
            .unwrap()
    }

    fn wait_for(
        tracker: &DirectionTracker,
        done: impl Fn(&DirectionSnapshot) -> bool,
    ) -> DirectionSnapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = tracker.snapshot();
            if done(&snapshot) || Instant::now() > deadline {
                return snapshot;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_publishes_readings() {
        let tracker = spawn_with(vec![ScriptedSource::new(vec![
            Ok(Some(block(0.0, 1.0))),
            Ok(None),
            Ok(Some(block(0.0, 1.0))),
            Ok(Some(block(0.0, 1.0))),
        ])]);

        let snapshot = wait_for(&tracker, |s| s.updates == 3);
        assert_eq!(snapshot.updates, 3);
        assert_eq!(snapshot.reading.azimuth, 90.0);
        assert_eq!(snapshot.status, TrackerStatus::Listening);

        let stats = tracker.stop().unwrap();
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.reconnects, 0);
    }

    #[test]
    fn test_device_loss_holds_last_direction() {
        let tracker = spawn_with(vec![ScriptedSource::new(vec![
            Ok(Some(block(0.0, 1.0))),
            Err(lost()),
        ])]);

        let snapshot = wait_for(&tracker, |s| {
            s.updates == 1 && s.status == TrackerStatus::DeviceUnavailable
        });
        assert_eq!(snapshot.status, TrackerStatus::DeviceUnavailable);
        assert_eq!(snapshot.reading.azimuth, 90.0);

        tracker.stop().unwrap();
    }

    #[test]
    fn test_reconnect_keeps_going() {
        let tracker = spawn_with(vec![
            ScriptedSource::new(vec![Ok(Some(block(0.0, 1.0))), Err(lost())]),
            ScriptedSource::new(vec![Ok(Some(block(1.0, 0.0)))]),
        ]);

        let snapshot = wait_for(&tracker, |s| s.updates == 2);
        assert_eq!(snapshot.reading.azimuth, -90.0);
        assert_eq!(snapshot.status, TrackerStatus::Listening);

        let stats = tracker.stop().unwrap();
        assert_eq!(stats.reconnects, 1);
    }

    #[test]
    fn test_invalid_block_is_rejected_and_skipped() {
        let tracker = spawn_with(vec![ScriptedSource::new(vec![
            Ok(Some(StereoFrameBlock::new(vec![0.0; 480], vec![0.0; 240]))),
            Ok(Some(block(0.5, 0.5))),
        ])]);

        let snapshot = wait_for(&tracker, |s| s.updates == 1);
        assert_eq!(snapshot.reading.azimuth, 0.0);

        let stats = tracker.stop().unwrap();
        assert_eq!(stats.rejected_blocks, 1);
        assert_eq!(stats.blocks, 1);
    }

    #[test]
    fn test_unavailable_from_the_start() {
        let tracker = spawn_with(vec![]);
        let snapshot = wait_for(&tracker, |s| s.status == TrackerStatus::DeviceUnavailable);
        assert_eq!(snapshot.status, TrackerStatus::DeviceUnavailable);
        assert_eq!(snapshot.updates, 0);
        assert_eq!(snapshot.reading.azimuth, 0.0);
        tracker.stop().unwrap();
    }

    #[test]
    fn test_stream_end_finishes_worker() {
        let tracker = spawn_with(vec![ScriptedSource::new(vec![
            Ok(Some(block(0.2, 0.2))),
            Err(AudioError::StreamEnded),
        ])]);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !tracker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(tracker.is_finished());
        assert_eq!(tracker.stop().unwrap().blocks, 1);
    }

    fn wait_until_finished(tracker: &DirectionTracker) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !tracker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_setup_error_ends_worker() {
        let tracker = DirectionTracker::spawn(&test_config(), || {
            Err::<ScriptedSource, _>(AudioError::UnsupportedChannels(1))
        })
        .unwrap();

        wait_until_finished(&tracker);
        assert!(tracker.is_finished());
        assert_eq!(tracker.snapshot().updates, 0);

        let err = tracker.stop().unwrap_err();
        assert!(matches!(
            err,
            CompassError::Audio(AudioError::UnsupportedChannels(1))
        ));
    }

    #[test]
    fn test_unknown_device_name_is_not_retried() {
        let mut attempts = 0;
        let tracker = DirectionTracker::spawn(&test_config(), move || {
            attempts += 1;
            assert_eq!(attempts, 1, "opened again after a setup error");
            Err::<ScriptedSource, _>(AudioError::DeviceNotFound("Speakerz".to_string()))
        })
        .unwrap();

        wait_until_finished(&tracker);
        assert!(matches!(
            tracker.stop(),
            Err(CompassError::Audio(AudioError::DeviceNotFound(_)))
        ));
    }

    #[test]
    fn test_missing_device_after_start_is_retried() {
        let mut sources: VecDeque<ScriptedSource> =
            vec![ScriptedSource::new(vec![Ok(Some(block(0.0, 1.0))), Err(lost())])].into();
        let tracker = DirectionTracker::spawn(&test_config(), move || {
            sources
                .pop_front()
                .ok_or_else(|| AudioError::DeviceNotFound("USB headset".to_string()))
        })
        .unwrap();

        let snapshot = wait_for(&tracker, |s| {
            s.updates == 1 && s.status == TrackerStatus::DeviceUnavailable
        });
        assert_eq!(snapshot.reading.azimuth, 90.0);
        thread::sleep(Duration::from_millis(30));
        assert!(!tracker.is_finished());
        tracker.stop().unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected_at_spawn() {
        let mut config = test_config();
        config.estimator.angle_curve_gamma = 0.0;
        let result = DirectionTracker::spawn(&config, || {
            Ok::<_, AudioError>(ScriptedSource::new(vec![]))
        });
        assert!(matches!(result, Err(CompassError::Config(_))));
    }
}
