//! Capture abstractions consumed by the audio analyzer.
//!
//! A [`CaptureBackend`] opens devices; the returned [`CaptureSource`] is owned
//! by the analyzer thread for its whole life, which is why sources do not
//! need to be `Send` (cpal streams are not on every platform).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::AudioError;

/// Parameters for opening one input device
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Device name or "default"
    pub device: String,
    pub chunk_size: usize,
    pub sample_rate: u32,
    /// Set while the analyzer is paused or shutting down; blocking reads
    /// observe it and return [`AudioError::Interrupted`].
    pub interrupt: Arc<AtomicBool>,
}

impl CaptureRequest {
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}

/// An open microphone stream delivering fixed-size chunks
pub trait CaptureSource {
    fn device_name(&self) -> &str;

    /// Block until `chunk` is completely filled with mono samples in [-1, 1].
    fn read_chunk(&mut self, chunk: &mut [f32]) -> Result<(), AudioError>;

    /// Drop audio captured while nobody was reading (after a pause).
    fn discard_pending(&mut self) {}
}

/// Factory for capture sources, shared with the analyzer thread
pub trait CaptureBackend: Send + Sync {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureSource>, AudioError>;
}

/// Sleep in short steps until `duration` elapsed or the interrupt flag is raised.
///
/// Returns false when interrupted.
pub(crate) fn interruptible_sleep(duration: Duration, interrupt: &AtomicBool) -> bool {
    const STEP: Duration = Duration::from_millis(2);
    let mut remaining = duration;
    while !remaining.is_zero() {
        if interrupt.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(STEP);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !interrupt.load(Ordering::SeqCst)
}
