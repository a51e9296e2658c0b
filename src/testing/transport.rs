use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::playback::Transport;

#[derive(Debug)]
struct ManualState {
    loaded: Option<PathBuf>,
    running: bool,
    elapsed_ms: i64,
    last_play_offset: Option<f64>,
    volume: f32,
    fail_next_load: Option<TransportError>,
    loads: Vec<PathBuf>,
}

impl Default for ManualState {
    fn default() -> Self {
        Self {
            loaded: None,
            running: false,
            elapsed_ms: 0,
            last_play_offset: None,
            volume: 1.0,
            fail_next_load: None,
            loads: Vec::new(),
        }
    }
}

/// Transport whose elapsed counter only moves when the test says so.
///
/// Clones share state: hand one clone to the session and keep the other to
/// drive time. Like a real transport, `play` restarts the counter at zero.
#[derive(Debug, Clone, Default)]
pub struct ManualTransport {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the elapsed counter (ms since the last `play`).
    pub fn set_elapsed(&self, elapsed_ms: i64) {
        self.state().elapsed_ms = elapsed_ms;
    }

    pub fn advance(&self, by_ms: i64) {
        self.state().elapsed_ms += by_ms;
    }

    /// Simulate the end of the file.
    pub fn finish(&self) {
        self.state().running = false;
    }

    /// Make the next `load` fail with `err`.
    pub fn fail_next_load(&self, err: TransportError) {
        self.state().fail_next_load = Some(err);
    }

    pub fn last_play_offset(&self) -> Option<f64> {
        self.state().last_play_offset
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.state().loaded.clone()
    }

    /// Every path passed to a successful `load`, in order
    pub fn loads(&self) -> Vec<PathBuf> {
        self.state().loads.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }
}

impl Transport for ManualTransport {
    fn load(&mut self, path: &Path) -> Result<(), TransportError> {
        let mut state = self.state();
        if let Some(err) = state.fail_next_load.take() {
            return Err(err);
        }
        state.loaded = Some(path.to_path_buf());
        state.loads.push(path.to_path_buf());
        state.running = false;
        Ok(())
    }

    fn play(&mut self, start_offset_seconds: Option<f64>) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.loaded.is_none() {
            return Err(TransportError::NotLoaded);
        }
        state.running = true;
        state.elapsed_ms = 0;
        state.last_play_offset = Some(start_offset_seconds.unwrap_or(0.0));
        Ok(())
    }

    fn elapsed_ms(&self) -> i64 {
        let state = self.state();
        if state.running {
            state.elapsed_ms
        } else {
            -1
        }
    }

    fn is_active(&self) -> bool {
        self.state().running
    }

    fn set_volume(&mut self, volume: f32) {
        self.state().volume = volume;
    }
}
