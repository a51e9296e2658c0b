use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::capture::{interruptible_sleep, CaptureBackend, CaptureRequest, CaptureSource};
use crate::error::AudioError;

/// Simulated time one chunk takes to arrive
const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(1);

type Pattern = Arc<dyn Fn(u64) -> f32 + Send + Sync>;

#[derive(Clone)]
enum Level {
    Shared(Arc<AtomicU32>),
    Pattern(Pattern),
}

impl Level {
    fn amplitude(&self, chunk_index: u64) -> f32 {
        match self {
            Level::Shared(bits) => f32::from_bits(bits.load(Ordering::Relaxed)),
            Level::Pattern(pattern) => pattern(chunk_index),
        }
    }
}

#[derive(Clone)]
struct DeviceScript {
    level: Level,
    fail_after: Option<u64>,
}

/// Live amplitude control for a scripted device
#[derive(Debug, Clone)]
pub struct LevelHandle {
    bits: Arc<AtomicU32>,
}

impl LevelHandle {
    pub fn set(&self, amplitude: f32) {
        self.bits.store(amplitude.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Default)]
struct BackendState {
    devices: Mutex<HashMap<String, DeviceScript>>,
    opens: AtomicUsize,
    live: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
}

/// Capture backend serving constant-amplitude (or patterned) chunks.
///
/// Clones share the device table and counters, so a test can keep one
/// clone to watch opens and releases performed on the analyzer thread.
#[derive(Clone, Default)]
pub struct ScriptedCaptureBackend {
    state: Arc<BackendState>,
    chunk_delay: Option<Duration>,
}

impl ScriptedCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(self, name: &str, script: DeviceScript) -> Self {
        self.state
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), script);
        self
    }

    /// Device delivering a constant amplitude in [-1, 1]
    pub fn with_constant(self, name: &str, amplitude: f32) -> Self {
        let bits = Arc::new(AtomicU32::new(amplitude.to_bits()));
        self.insert(
            name,
            DeviceScript {
                level: Level::Shared(bits),
                fail_after: None,
            },
        )
    }

    /// Device whose amplitude is computed per chunk index
    pub fn with_pattern<F>(self, name: &str, pattern: F) -> Self
    where
        F: Fn(u64) -> f32 + Send + Sync + 'static,
    {
        self.insert(
            name,
            DeviceScript {
                level: Level::Pattern(Arc::new(pattern)),
                fail_after: None,
            },
        )
    }

    /// Device that fails with a stream error after `chunks` good reads
    pub fn with_failure_after(self, name: &str, amplitude: f32, chunks: u64) -> Self {
        let bits = Arc::new(AtomicU32::new(amplitude.to_bits()));
        self.insert(
            name,
            DeviceScript {
                level: Level::Shared(bits),
                fail_after: Some(chunks),
            },
        )
    }

    /// Simulated delivery time per chunk (default 1 ms)
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Amplitude control for a device added with `with_constant`
    pub fn level_handle(&self, name: &str) -> Option<LevelHandle> {
        let devices = self
            .state
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match devices.get(name).map(|script| &script.level) {
            Some(Level::Shared(bits)) => Some(LevelHandle {
                bits: Arc::clone(bits),
            }),
            _ => None,
        }
    }

    /// Successful opens so far
    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Sources opened and not yet dropped
    pub fn live_sources(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Times the analyzer asked a source to drop audio captured while paused
    pub fn discard_count(&self) -> usize {
        self.state.discards.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for ScriptedCaptureBackend {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureSource>, AudioError> {
        let script = self
            .state
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&request.device)
            .cloned()
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: request.device.clone(),
            })?;

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource {
            device_name: request.device.clone(),
            script,
            chunk_delay: self.chunk_delay.unwrap_or(DEFAULT_CHUNK_DELAY),
            reads: 0,
            interrupt: Arc::clone(&request.interrupt),
            live: Arc::clone(&self.state.live),
            discards: Arc::clone(&self.state.discards),
        }))
    }
}

struct ScriptedSource {
    device_name: String,
    script: DeviceScript,
    chunk_delay: Duration,
    reads: u64,
    interrupt: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
}

impl CaptureSource for ScriptedSource {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn read_chunk(&mut self, chunk: &mut [f32]) -> Result<(), AudioError> {
        if !interruptible_sleep(self.chunk_delay, &self.interrupt) {
            return Err(AudioError::Interrupted);
        }
        if self.script.fail_after.is_some_and(|limit| self.reads >= limit) {
            return Err(AudioError::StreamFailure {
                reason: format!("{} disconnected", self.device_name),
            });
        }
        chunk.fill(self.script.level.amplitude(self.reads));
        self.reads += 1;
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.discards.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
