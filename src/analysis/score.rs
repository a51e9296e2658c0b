// Score counters accumulated by the analyzer while the gate is open

use serde::{Deserialize, Serialize};

/// Hit/total chunk counters for the current song
///
/// Only the analyzer increments them, and only while the singing gate is
/// open. `hit_samples <= total_samples` always holds because both are
/// updated together in [`ScoreCounters::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCounters {
    pub total_samples: u64,
    pub hit_samples: u64,
}

impl ScoreCounters {
    pub fn record(&mut self, hit: bool) {
        self.total_samples += 1;
        if hit {
            self.hit_samples += 1;
        }
    }

    /// Fraction of gated chunks that were loud enough, 0.0 when nothing was gated.
    pub fn accuracy(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        self.hit_samples as f64 / self.total_samples as f64
    }

    /// Final score in [0, 100]
    pub fn score(&self) -> u8 {
        if self.total_samples == 0 {
            return 0;
        }
        (self.accuracy() * 100.0).min(100.0).round() as u8
    }
}
