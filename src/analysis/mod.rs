// Analysis module - microphone energy analysis and scoring
//
// The AudioAnalyzer runs on its own long-lived thread, paced by capture
// chunk delivery rather than the UI tick.
//
// Architecture:
// - AnalyzerWorker: thread loop that reads chunks and measures energy
// - SharedState: the only state visible to both threads
// - ScoreCounters: hit/total counters read out as the final score
//
// Control ladder (UI side): pause -> stop_streams -> shutdown. A pause is
// acknowledged by the worker before any stream is released.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::capture::CaptureBackend;
use crate::config::{AudioConfig, ScoringConfig};
use crate::error::AudioError;

pub mod score;
pub mod shared;
mod worker;

pub use score::ScoreCounters;
pub use shared::{GateHandle, SharedState, MAX_INPUTS};

use worker::AnalyzerWorker;

/// Poll interval for the bounded stop/shutdown waits
const ACK_POLL: Duration = Duration::from_millis(1);

/// Handle to the analyzer thread
///
/// Created paused; call [`AudioAnalyzer::resume`] when a song starts. All
/// methods are callable from the UI loop and never block on a capture read.
pub struct AudioAnalyzer {
    shared: Arc<SharedState>,
    backend: Arc<dyn CaptureBackend>,
    handle: Option<JoinHandle<()>>,
    scoring: ScoringConfig,
}

impl AudioAnalyzer {
    /// Spawn the analyzer thread.
    ///
    /// Devices are opened lazily on the first `resume`, on the analyzer
    /// thread itself. A device that cannot be opened leaves the analyzer in
    /// disabled mode instead of failing here.
    ///
    /// # Errors
    /// Returns `AudioError::InvalidConfig` for an unusable snapshot and
    /// `AudioError::ThreadSpawnFailed` if the OS refuses the thread.
    pub fn spawn(
        backend: Arc<dyn CaptureBackend>,
        config: AudioConfig,
        scoring: ScoringConfig,
    ) -> Result<Self, AudioError> {
        config.validate()?;
        let shared = Arc::new(SharedState::new(config));
        let handle = spawn_worker(&shared, &backend, &scoring)?;

        tracing::info!("[AudioAnalyzer] Analyzer thread spawned");
        Ok(Self {
            shared,
            backend,
            handle: Some(handle),
            scoring,
        })
    }

    /// Stop consuming audio without closing the streams.
    pub fn pause(&self) {
        self.shared.request_pause();
    }

    /// Resume consumption, opening devices first if they were released.
    ///
    /// A loop that ended on a capture failure is restarted with fresh
    /// device handles, so one broken song does not disable the next.
    ///
    /// # Errors
    /// Returns `AudioError::NotRunning` after [`AudioAnalyzer::shutdown`].
    pub fn resume(&mut self) -> Result<(), AudioError> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(AudioError::NotRunning);
        };
        if self.shared.is_degraded() || handle.is_finished() {
            self.restart_worker()?;
        }
        self.shared.clear_pause();
        Ok(())
    }

    /// Fully release the device handles.
    ///
    /// Pauses first and waits (bounded by `stop_grace_ms`) for the worker to
    /// acknowledge, so a stream is never closed under an in-flight read. If
    /// the grace period runs out the release stays pending and the worker
    /// performs it as soon as it reaches the paused branch.
    pub fn stop_streams(&self) {
        if !self.is_running() {
            return;
        }
        let epoch = self.shared.request_pause();
        if !self.wait_for(|s| s.pause_acknowledged(epoch)) {
            tracing::warn!(
                "[AudioAnalyzer] Pause not acknowledged within {} ms",
                self.scoring.stop_grace_ms
            );
        }

        self.shared.request_release();
        if !self.wait_for(|s| s.streams_released()) {
            tracing::warn!("[AudioAnalyzer] Stream release still pending after grace period");
        }
    }

    /// Stop the loop, join the thread and release every device. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.stop_running();
        if handle.join().is_err() {
            tracing::error!("[AudioAnalyzer] Analyzer thread panicked");
        }
        tracing::info!("[AudioAnalyzer] Shut down");
    }

    /// Replace the audio config snapshot; applied before the next chunk read.
    pub fn apply_config(&self, config: AudioConfig) -> Result<(), AudioError> {
        config.validate()?;
        tracing::info!(
            "[AudioAnalyzer] Applying config: mic1={}, mic2={}, chunk={}, difficulty={:?}",
            config.input_device_1,
            config.input_device_2,
            config.chunk_size,
            config.difficulty
        );
        self.shared.replace_config(config);
        Ok(())
    }

    pub fn config(&self) -> AudioConfig {
        self.shared.config_snapshot()
    }

    /// Write end of the singing gate for the UI loop
    pub fn gate(&self) -> GateHandle {
        GateHandle::new(Arc::clone(&self.shared))
    }

    pub fn set_gate(&self, active: bool) {
        self.shared.set_gate(active);
    }

    /// Latest energy per input slot; frozen at the last value after a failure
    pub fn energies(&self) -> [f64; MAX_INPUTS] {
        self.shared.energies()
    }

    pub fn counters(&self) -> ScoreCounters {
        self.shared.counters()
    }

    pub fn accuracy(&self) -> f64 {
        self.counters().accuracy()
    }

    pub fn score(&self) -> u8 {
        self.counters().score()
    }

    pub fn reset_counters(&self) {
        self.shared.reset_counters();
    }

    /// Threshold the current difficulty maps to
    pub fn threshold(&self) -> f64 {
        self.scoring.threshold_for(self.config().difficulty)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// True once a capture read failed and the loop terminated
    pub fn is_degraded(&self) -> bool {
        self.shared.is_degraded()
    }

    /// True when no configured microphone could be opened
    pub fn is_disabled(&self) -> bool {
        self.shared.is_disabled()
    }

    fn restart_worker(&mut self) -> Result<(), AudioError> {
        if let Some(handle) = self.handle.take() {
            // The loop has already broken out; this only waits for the release
            if handle.join().is_err() {
                tracing::error!("[AudioAnalyzer] Analyzer thread panicked");
            }
        }
        tracing::info!("[AudioAnalyzer] Restarting analyzer thread after capture failure");
        self.shared.revive();
        self.handle = Some(spawn_worker(&self.shared, &self.backend, &self.scoring)?);
        Ok(())
    }

    fn wait_for<F: Fn(&SharedState) -> bool>(&self, done: F) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.scoring.stop_grace_ms);
        loop {
            if done(&self.shared) || !self.shared.is_running() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(ACK_POLL);
        }
    }
}

/// Start the analyzer loop; the worker and its capture sources are built on
/// the new thread and never leave it.
fn spawn_worker(
    shared: &Arc<SharedState>,
    backend: &Arc<dyn CaptureBackend>,
    scoring: &ScoringConfig,
) -> Result<JoinHandle<()>, AudioError> {
    let shared = Arc::clone(shared);
    let backend = Arc::clone(backend);
    let scoring = scoring.clone();
    thread::Builder::new()
        .name("karaoke-analyzer".to_string())
        .spawn(move || AnalyzerWorker::new(shared, backend, scoring).run())
        .map_err(|e| AudioError::ThreadSpawnFailed {
            reason: e.to_string(),
        })
}

impl Drop for AudioAnalyzer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCaptureBackend;

    fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn spawn_with(backend: ScriptedCaptureBackend, config: AudioConfig) -> AudioAnalyzer {
        AudioAnalyzer::spawn(Arc::new(backend), config, ScoringConfig::default()).unwrap()
    }

    #[test]
    fn test_starts_paused_without_opening_devices() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
        let watcher = backend.clone();
        let analyzer = spawn_with(backend, AudioConfig::default());

        thread::sleep(Duration::from_millis(20));
        assert!(analyzer.is_paused());
        assert_eq!(watcher.open_count(), 0);
        assert_eq!(analyzer.counters(), ScoreCounters::default());
    }

    #[test]
    fn test_gated_counting() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();

        // Energies are live even while the gate is closed
        assert!(wait_until(|| analyzer.energies()[0] > 0.0));
        assert_eq!(analyzer.counters().total_samples, 0);

        analyzer.set_gate(true);
        assert!(wait_until(|| analyzer.counters().total_samples >= 5));
        analyzer.set_gate(false);

        let counters = analyzer.counters();
        assert_eq!(counters.hit_samples, counters.total_samples);
    }

    #[test]
    fn test_quiet_input_scores_misses() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.0);
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        analyzer.set_gate(true);

        assert!(wait_until(|| analyzer.counters().total_samples >= 3));
        assert_eq!(analyzer.counters().hit_samples, 0);
        assert_eq!(analyzer.score(), 0);
    }

    #[test]
    fn test_missing_device_disables_scoring() {
        let backend = ScriptedCaptureBackend::new();
        let config = AudioConfig {
            input_device_1: "Ghost Mic".to_string(),
            ..AudioConfig::default()
        };
        let mut analyzer = spawn_with(backend, config);
        analyzer.resume().unwrap();
        analyzer.set_gate(true);

        assert!(wait_until(|| analyzer.is_disabled()));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(analyzer.counters(), ScoreCounters::default());
        assert_eq!(analyzer.score(), 0);
    }

    #[test]
    fn test_read_failure_degrades_and_freezes_metrics() {
        let backend = ScriptedCaptureBackend::new().with_failure_after("default", 0.5, 3);
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();

        assert!(wait_until(|| analyzer.is_degraded()));
        let frozen = analyzer.energies();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(analyzer.energies(), frozen);

        // Session-side controls keep working on a degraded analyzer
        analyzer.stop_streams();
        analyzer.shutdown();
    }

    #[test]
    fn test_resume_discards_audio_captured_while_paused() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
        let watcher = backend.clone();
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.live_sources() == 1));
        assert_eq!(watcher.discard_count(), 0);

        let epoch = analyzer.shared.request_pause();
        assert!(wait_until(|| analyzer.shared.pause_acknowledged(epoch)));
        analyzer.resume().unwrap();

        assert!(wait_until(|| watcher.discard_count() == 1));
        assert_eq!(watcher.open_count(), 1);
    }

    #[test]
    fn test_resume_after_degradation_restarts_the_loop() {
        let backend = ScriptedCaptureBackend::new().with_failure_after("default", 0.5, 3);
        let watcher = backend.clone();
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        assert!(wait_until(|| analyzer.is_degraded()));
        assert!(wait_until(|| watcher.live_sources() == 0));

        analyzer.pause();
        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.open_count() == 2));

        analyzer.shutdown();
        assert_eq!(watcher.live_sources(), 0);
        assert_eq!(analyzer.resume(), Err(AudioError::NotRunning));
    }

    #[test]
    fn test_stop_streams_releases_and_resume_reopens() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
        let watcher = backend.clone();
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.live_sources() == 1));

        analyzer.pause();
        analyzer.stop_streams();
        assert!(wait_until(|| watcher.live_sources() == 0));

        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.live_sources() == 1));
        assert_eq!(watcher.open_count(), 2);
    }

    #[test]
    fn test_apply_config_reopens_on_device_change() {
        let backend = ScriptedCaptureBackend::new()
            .with_constant("default", 0.5)
            .with_constant("USB Mic", 0.5);
        let watcher = backend.clone();
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.live_sources() == 1));

        let config = AudioConfig {
            input_device_2: "USB Mic".to_string(),
            mic2_gain: 2.0,
            ..AudioConfig::default()
        };
        analyzer.apply_config(config).unwrap();
        assert!(wait_until(|| watcher.live_sources() == 2));
        assert!(wait_until(|| analyzer.energies()[1] > analyzer.energies()[0]));
    }

    #[test]
    fn test_apply_config_rejects_invalid_snapshot() {
        let analyzer = spawn_with(ScriptedCaptureBackend::new(), AudioConfig::default());
        let bad = AudioConfig {
            chunk_size: 0,
            ..AudioConfig::default()
        };
        assert!(matches!(
            analyzer.apply_config(bad),
            Err(AudioError::InvalidConfig { .. })
        ));
        assert_eq!(analyzer.config().chunk_size, 1024);
    }

    #[test]
    fn test_shutdown_twice_is_noop() {
        let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
        let watcher = backend.clone();
        let mut analyzer = spawn_with(backend, AudioConfig::default());
        analyzer.resume().unwrap();
        assert!(wait_until(|| watcher.live_sources() == 1));

        analyzer.shutdown();
        analyzer.shutdown();
        assert_eq!(watcher.live_sources(), 0);
        assert!(!analyzer.is_running());
        assert_eq!(analyzer.resume(), Err(AudioError::NotRunning));
    }
}
