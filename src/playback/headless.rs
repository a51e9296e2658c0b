//! Silent transport for headless sessions.
//!
//! Validates and measures WAV files with hound and reports elapsed time from
//! a [`TimeSource`], without producing any sound. Playback ends when the
//! file's duration has passed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::time::TimeSource;
use super::transport::Transport;
use crate::error::TransportError;

#[derive(Debug, Clone)]
struct LoadedTrack {
    path: PathBuf,
    duration_ms: u64,
}

pub struct HeadlessTransport {
    time: Arc<dyn TimeSource>,
    loaded: Option<LoadedTrack>,
    started_at: Option<Instant>,
    start_offset_ms: u64,
    volume: f32,
}

impl HeadlessTransport {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            loaded: None,
            started_at: None,
            start_offset_ms: 0,
            volume: 1.0,
        }
    }

    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|track| track.path.as_path())
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.loaded.as_ref().map(|track| track.duration_ms)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn raw_elapsed_ms(&self) -> Option<u64> {
        let started_at = self.started_at?;
        Some(
            self.time
                .now()
                .saturating_duration_since(started_at)
                .as_millis() as u64,
        )
    }
}

/// Read a WAV header and compute its length in milliseconds.
fn probe_wav(path: &Path) -> Result<u64, TransportError> {
    let display = path.display().to_string();
    let reader = hound::WavReader::open(path).map_err(|e| TransportError::DecodeFailed {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(TransportError::DecodeFailed {
            path: display,
            reason: "sample rate is 0".to_string(),
        });
    }
    Ok(reader.duration() as u64 * 1000 / spec.sample_rate as u64)
}

impl Transport for HeadlessTransport {
    fn load(&mut self, path: &Path) -> Result<(), TransportError> {
        if !path.exists() {
            return Err(TransportError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if !is_wav {
            return Err(TransportError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }

        let duration_ms = probe_wav(path)?;
        tracing::debug!(
            "[HeadlessTransport] Loaded {} ({} ms)",
            path.display(),
            duration_ms
        );
        self.loaded = Some(LoadedTrack {
            path: path.to_path_buf(),
            duration_ms,
        });
        self.started_at = None;
        self.start_offset_ms = 0;
        Ok(())
    }

    fn play(&mut self, start_offset_seconds: Option<f64>) -> Result<(), TransportError> {
        if self.loaded.is_none() {
            return Err(TransportError::NotLoaded);
        }
        let offset_seconds = start_offset_seconds.unwrap_or(0.0).max(0.0);
        self.start_offset_ms = (offset_seconds * 1000.0).round() as u64;
        self.started_at = Some(self.time.now());
        Ok(())
    }

    fn elapsed_ms(&self) -> i64 {
        if !self.is_active() {
            return -1;
        }
        self.raw_elapsed_ms().map(|ms| ms as i64).unwrap_or(-1)
    }

    fn is_active(&self) -> bool {
        match (&self.loaded, self.raw_elapsed_ms()) {
            (Some(track), Some(elapsed)) => self.start_offset_ms + elapsed < track.duration_ms,
            _ => false,
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
}
