// State shared between the UI loop and the analyzer thread
//
// This is the complete set of fields that cross the thread boundary:
// - gate:     singing-gate flag (UI writes, analyzer reads)
// - paused:   pause flag, doubles as the interrupt for blocking reads
// - config:   AudioConfig snapshot + generation counter
// - energies: latest per-device energy (analyzer writes, UI reads)
// - counters: score counters (analyzer writes, UI reads/resets)
// plus the acknowledgement flags used by the pause/stop/shutdown ladder.
// Every field is last-writer-wins; nothing here queues history.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::score::ScoreCounters;
use crate::config::AudioConfig;

/// Number of simultaneous microphones supported
pub const MAX_INPUTS: usize = 2;

pub struct SharedState {
    gate: AtomicBool,
    paused: Arc<AtomicBool>,
    pause_epoch: AtomicU64,
    acked_epoch: AtomicU64,
    release_requested: AtomicBool,
    streams_released: AtomicBool,
    running: AtomicBool,
    degraded: AtomicBool,
    disabled: AtomicBool,
    config: Mutex<AudioConfig>,
    config_generation: AtomicU64,
    energies: [AtomicU64; MAX_INPUTS],
    counters: Mutex<ScoreCounters>,
}

impl SharedState {
    /// New state block: paused, gate closed, streams not yet opened.
    pub fn new(config: AudioConfig) -> Self {
        Self {
            gate: AtomicBool::new(false),
            paused: Arc::new(AtomicBool::new(true)),
            pause_epoch: AtomicU64::new(0),
            acked_epoch: AtomicU64::new(0),
            release_requested: AtomicBool::new(false),
            streams_released: AtomicBool::new(true),
            running: AtomicBool::new(true),
            degraded: AtomicBool::new(false),
            disabled: AtomicBool::new(false),
            config: Mutex::new(config),
            config_generation: AtomicU64::new(1),
            energies: [AtomicU64::new(0), AtomicU64::new(0)],
            counters: Mutex::new(ScoreCounters::default()),
        }
    }

    // ------------------------------------------------------------------
    // Gate
    // ------------------------------------------------------------------

    pub fn set_gate(&self, active: bool) {
        self.gate.store(active, Ordering::SeqCst);
    }

    pub fn gate(&self) -> bool {
        self.gate.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Pause / release / shutdown ladder
    // ------------------------------------------------------------------

    /// Request a pause and return the epoch the analyzer must acknowledge.
    pub fn request_pause(&self) -> u64 {
        self.paused.store(true, Ordering::SeqCst);
        self.pause_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn clear_pause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Flag handed to capture sources so blocking reads can bail out.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    /// Called by the analyzer whenever it is idle in the paused branch.
    pub fn acknowledge_pause(&self) {
        let epoch = self.pause_epoch.load(Ordering::SeqCst);
        self.acked_epoch.store(epoch, Ordering::SeqCst);
    }

    pub fn pause_acknowledged(&self, epoch: u64) -> bool {
        self.acked_epoch.load(Ordering::SeqCst) >= epoch
    }

    pub fn request_release(&self) {
        self.streams_released.store(false, Ordering::SeqCst);
        self.release_requested.store(true, Ordering::SeqCst);
    }

    /// Analyzer side: consume a pending release request.
    pub fn take_release_request(&self) -> bool {
        self.release_requested.swap(false, Ordering::SeqCst)
    }

    pub fn set_streams_released(&self, released: bool) {
        self.streams_released.store(released, Ordering::SeqCst);
    }

    pub fn streams_released(&self) -> bool {
        self.streams_released.load(Ordering::SeqCst)
    }

    pub fn stop_running(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Reset the health flags before a new analyzer loop takes over.
    ///
    /// Counters, energies and the config snapshot are kept.
    pub fn revive(&self) {
        self.release_requested.store(false, Ordering::SeqCst);
        self.streams_released.store(true, Ordering::SeqCst);
        self.degraded.store(false, Ordering::SeqCst);
        self.disabled.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    pub fn set_degraded(&self) {
        self.degraded.store(true, Ordering::SeqCst);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Config snapshot
    // ------------------------------------------------------------------

    pub fn replace_config(&self, config: AudioConfig) {
        *lock_recover(&self.config) = config;
        self.config_generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn config_generation(&self) -> u64 {
        self.config_generation.load(Ordering::SeqCst)
    }

    pub fn config_snapshot(&self) -> AudioConfig {
        lock_recover(&self.config).clone()
    }

    // ------------------------------------------------------------------
    // Live energies
    // ------------------------------------------------------------------

    pub fn publish_energy(&self, slot: usize, energy: f64) {
        if let Some(cell) = self.energies.get(slot) {
            cell.store(energy.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn energy(&self, slot: usize) -> f64 {
        self.energies
            .get(slot)
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    pub fn energies(&self) -> [f64; MAX_INPUTS] {
        [self.energy(0), self.energy(1)]
    }

    // ------------------------------------------------------------------
    // Score counters
    // ------------------------------------------------------------------

    pub fn record_chunk(&self, hit: bool) {
        lock_recover(&self.counters).record(hit);
    }

    pub fn counters(&self) -> ScoreCounters {
        *lock_recover(&self.counters)
    }

    pub fn reset_counters(&self) {
        *lock_recover(&self.counters) = ScoreCounters::default();
    }
}

/// Counters and config are plain data, so a panic while holding the lock
/// cannot leave them half-updated; keep using the inner value.
fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write end of the singing gate, handed to the UI side
#[derive(Clone)]
pub struct GateHandle {
    shared: Arc<SharedState>,
}

impl GateHandle {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    pub fn set(&self, active: bool) {
        self.shared.set_gate(active);
    }

    pub fn is_open(&self) -> bool {
        self.shared.gate()
    }
}
