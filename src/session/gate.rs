// SingingGate - is the performer expected to sing right now?

use crate::analysis::GateHandle;
use crate::lyrics::LyricLine;

/// Pure gate rule: a current line exists and song-time is inside it.
pub fn is_singing(song_time_ms: u64, current_line: Option<&LyricLine>) -> bool {
    current_line.is_some_and(|line| line.contains(song_time_ms))
}

/// Writes the gate flag to the analyzer once per UI tick
pub struct SingingGate {
    handle: GateHandle,
    active: bool,
}

impl SingingGate {
    pub fn new(handle: GateHandle) -> Self {
        handle.set(false);
        Self {
            handle,
            active: false,
        }
    }

    /// Evaluate the gate for this tick and forward it to the analyzer.
    pub fn evaluate(&mut self, song_time_ms: u64, current_line: Option<&LyricLine>) -> bool {
        let active = is_singing(song_time_ms, current_line);
        if active != self.active {
            tracing::trace!(
                "[SingingGate] {} at {} ms",
                if active { "open" } else { "closed" },
                song_time_ms
            );
        }
        self.active = active;
        self.handle.set(active);
        active
    }

    /// Force the gate shut (song end, pause, seek in progress).
    pub fn close(&mut self) {
        self.active = false;
        self.handle.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
