//! WAV-file microphones.
//!
//! Replays a recorded vocal take as if it were a live input device. Paced in
//! real time for headless sessions (`karaoke_cli play --mic wav:<path>`), or
//! served as fast as the analyzer asks, with no pacing at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::capture::{interruptible_sleep, CaptureBackend, CaptureRequest, CaptureSource};
use crate::error::AudioError;

/// Decode a WAV file into mono f32 samples in [-1, 1] (first channel only).
///
/// # Returns
/// The samples and the file's sample rate.
pub fn read_wav_mono<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32), AudioError> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path).map_err(|e| AudioError::StreamOpenFailed {
        reason: format!("{}: {}", path.display(), e),
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::StreamFailure {
                reason: format!("{}: {}", path.display(), e),
            })?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::StreamFailure {
                    reason: format!("{}: {}", path.display(), e),
                })?
        }
    };

    let mono = interleaved.into_iter().step_by(channels).collect();
    Ok((mono, spec.sample_rate))
}

/// Maps device names to WAV files
#[derive(Debug, Clone, Default)]
pub struct WavCaptureBackend {
    devices: HashMap<String, PathBuf>,
    realtime: bool,
}

impl WavCaptureBackend {
    /// Backend that serves chunks immediately, without waiting for real time
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that paces chunks at the file's sample rate
    pub fn realtime() -> Self {
        Self {
            devices: HashMap::new(),
            realtime: true,
        }
    }

    pub fn with_device(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.devices.insert(name.into(), path.into());
        self
    }
}

impl CaptureBackend for WavCaptureBackend {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureSource>, AudioError> {
        let path = self
            .devices
            .get(&request.device)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: request.device.clone(),
            })?;
        let (samples, sample_rate) = read_wav_mono(path)?;
        tracing::info!(
            "[Capture] Replaying {} as '{}' ({} samples @ {} Hz)",
            path.display(),
            request.device,
            samples.len(),
            sample_rate
        );

        Ok(Box::new(WavCapture {
            device_name: request.device.clone(),
            samples,
            position: 0,
            sample_rate: sample_rate.max(1),
            realtime: self.realtime,
            started: None,
            interrupt: Arc::clone(&request.interrupt),
        }))
    }
}

/// One open WAV "device"; reads past the end return silence.
pub struct WavCapture {
    device_name: String,
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
    realtime: bool,
    started: Option<Instant>,
    interrupt: Arc<AtomicBool>,
}

impl WavCapture {
    fn seconds(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / self.sample_rate as f64)
    }

    fn wait_until_due(&mut self, chunk_len: usize) -> Result<(), AudioError> {
        let started = match self.started {
            Some(started) => started,
            None => {
                // Anchor so that the samples already consumed count as elapsed
                let now = Instant::now();
                let anchor = now.checked_sub(self.seconds(self.position)).unwrap_or(now);
                self.started = Some(anchor);
                anchor
            }
        };
        let due = started + self.seconds(self.position + chunk_len);
        let wait = due.saturating_duration_since(Instant::now());
        if interruptible_sleep(wait, &self.interrupt) {
            Ok(())
        } else {
            // Re-anchored on the next read, without catching up in a burst
            self.started = None;
            Err(AudioError::Interrupted)
        }
    }
}

impl CaptureSource for WavCapture {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn read_chunk(&mut self, chunk: &mut [f32]) -> Result<(), AudioError> {
        if self.realtime {
            self.wait_until_due(chunk.len())?;
        }

        let start = self.position.min(self.samples.len());
        let take = (self.samples.len() - start).min(chunk.len());
        chunk[..take].copy_from_slice(&self.samples[start..start + take]);
        chunk[take..].fill(0.0);
        self.position += chunk.len();
        Ok(())
    }
}
