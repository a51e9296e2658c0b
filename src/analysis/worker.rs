// Analyzer thread loop
//
// Reads one chunk per configured input, publishes the live energies and,
// while the singing gate is open, records a hit/miss into the score
// counters. Capture sources are created and dropped on this thread only.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::shared::SharedState;
use crate::audio::capture::{CaptureBackend, CaptureRequest, CaptureSource};
use crate::audio::energy::chunk_energy;
use crate::config::{AudioConfig, InputSlot, ScoringConfig};
use crate::error::{log_audio_error, AudioError};

/// Sleep between polls while paused or running without a device
const IDLE_POLL: Duration = Duration::from_millis(5);

struct OpenInput {
    slot: usize,
    gain: f32,
    source: Box<dyn CaptureSource>,
}

pub(crate) struct AnalyzerWorker {
    shared: Arc<SharedState>,
    backend: Arc<dyn CaptureBackend>,
    scoring: ScoringConfig,

    config: AudioConfig,
    applied_generation: u64,
    inputs: Vec<OpenInput>,
    /// False until devices were opened for the current config (or after a release)
    devices_ready: bool,
    chunk: Vec<f32>,
    chunks_read: u64,
}

impl AnalyzerWorker {
    pub(crate) fn new(
        shared: Arc<SharedState>,
        backend: Arc<dyn CaptureBackend>,
        scoring: ScoringConfig,
    ) -> Self {
        let config = shared.config_snapshot();
        let applied_generation = shared.config_generation();
        Self {
            shared,
            backend,
            scoring,
            chunk: vec![0.0; config.chunk_size],
            config,
            applied_generation,
            inputs: Vec::new(),
            devices_ready: false,
            chunks_read: 0,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::info!("[Analyzer] Starting analysis loop (paused)");

        let mut was_paused = true;
        while self.shared.is_running() {
            if self.shared.is_paused() {
                self.idle_paused();
                was_paused = true;
                continue;
            }

            self.sync_config();

            if was_paused {
                was_paused = false;
                for input in &mut self.inputs {
                    input.source.discard_pending();
                }
            }

            if !self.devices_ready {
                self.open_inputs();
            }

            if self.inputs.is_empty() {
                // Disabled: no microphone, counters stay untouched
                thread::sleep(IDLE_POLL);
                continue;
            }

            match self.read_and_measure() {
                Ok(Some(loudest)) => {
                    if self.shared.gate() {
                        let threshold = self.scoring.threshold_for(self.config.difficulty);
                        self.shared.record_chunk(loudest > threshold);
                    }
                    self.chunks_read += 1;
                }
                Ok(None) => continue,
                Err(err) => {
                    log_audio_error(&err, "analyzer read loop");
                    tracing::error!(
                        "[Analyzer] Capture failed after {} chunks, terminating loop",
                        self.chunks_read
                    );
                    self.shared.set_degraded();
                    break;
                }
            }
        }

        self.release_inputs();
        self.shared.stop_running();
        tracing::info!("[Analyzer] Analysis loop exited");
    }

    /// Paused branch: honour release requests and acknowledge the pause.
    fn idle_paused(&mut self) {
        if self.shared.take_release_request() {
            self.release_inputs();
            self.shared.set_streams_released(true);
        }
        self.shared.acknowledge_pause();
        thread::sleep(IDLE_POLL);
    }

    /// Pick up a new config snapshot before the next chunk read.
    fn sync_config(&mut self) {
        let generation = self.shared.config_generation();
        if generation == self.applied_generation {
            return;
        }
        let next = self.shared.config_snapshot();
        if !next.same_devices(&self.config) {
            tracing::info!("[Analyzer] Device layout changed, reopening inputs");
            self.release_inputs();
        } else {
            for input in &mut self.inputs {
                input.gain = match input.slot {
                    0 => next.mic1_gain,
                    _ => next.mic2_gain,
                };
            }
        }
        if next.chunk_size != self.chunk.len() {
            self.chunk.resize(next.chunk_size, 0.0);
        }
        self.config = next;
        self.applied_generation = generation;
    }

    fn open_inputs(&mut self) {
        self.devices_ready = true;
        let slots = self.config.active_inputs();
        for InputSlot { slot, device, gain } in slots {
            let request = CaptureRequest {
                device: device.clone(),
                chunk_size: self.config.chunk_size,
                sample_rate: self.config.sample_rate,
                interrupt: self.shared.interrupt_flag(),
            };
            match self.backend.open(&request) {
                Ok(source) => {
                    tracing::info!(
                        "[Analyzer] Mic {} opened: {}",
                        slot + 1,
                        source.device_name()
                    );
                    self.inputs.push(OpenInput { slot, gain, source });
                }
                Err(err) => {
                    log_audio_error(&err, "analyzer open input");
                    tracing::warn!("[Analyzer] Mic {} ({}) unavailable", slot + 1, device);
                }
            }
        }

        let disabled = self.inputs.is_empty();
        if disabled {
            tracing::warn!("[Analyzer] No microphone available, scoring disabled");
        }
        self.shared.set_disabled(disabled);
        self.shared.set_streams_released(disabled);
    }

    fn release_inputs(&mut self) {
        if !self.inputs.is_empty() {
            tracing::info!("[Analyzer] Releasing {} input(s)", self.inputs.len());
        }
        self.inputs.clear();
        self.devices_ready = false;
    }

    /// Read one chunk from every input.
    ///
    /// Returns the loudest energy, or `None` when a read was interrupted by a
    /// pause/shutdown and nothing should be recorded for this iteration.
    fn read_and_measure(&mut self) -> Result<Option<f64>, AudioError> {
        let mut loudest = 0.0_f64;
        for input in &mut self.inputs {
            match input.source.read_chunk(&mut self.chunk) {
                Ok(()) => {}
                Err(AudioError::Interrupted) => return Ok(None),
                Err(err) => return Err(err),
            }
            let energy = chunk_energy(&self.chunk, input.gain);
            self.shared.publish_energy(input.slot, energy);
            loudest = loudest.max(energy);
        }
        Ok(Some(loudest))
    }
}
