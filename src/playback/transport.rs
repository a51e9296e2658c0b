// Transport capability consumed by the playback clock

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Audio output subsystem that decodes and plays one file at a time.
///
/// The elapsed counter restarts at zero on every `play`, which is why the
/// session never reads it directly; see [`super::PlaybackClock`].
pub trait Transport: Send {
    /// Load a file, replacing whatever was loaded before.
    fn load(&mut self, path: &Path) -> Result<(), TransportError>;

    /// Start playback, optionally from an offset into the file (seconds).
    fn play(&mut self, start_offset_seconds: Option<f64>) -> Result<(), TransportError>;

    /// Milliseconds since the last `play`, or -1 when not running.
    fn elapsed_ms(&self) -> i64;

    fn is_active(&self) -> bool;

    /// Output volume in 0.0..=1.0
    fn set_volume(&mut self, volume: f32);
}

/// Which rendition of the song the transport is playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Backing track without vocals
    #[default]
    Instrumental,
    /// Original recording with vocals
    Vocal,
}

impl TrackKind {
    pub fn toggled(self) -> Self {
        match self {
            TrackKind::Instrumental => TrackKind::Vocal,
            TrackKind::Vocal => TrackKind::Instrumental,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Instrumental => write!(f, "instrumental"),
            TrackKind::Vocal => write!(f, "vocal"),
        }
    }
}
