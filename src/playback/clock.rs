// PlaybackClock - continuous song-time over a transport that resets on reload
//
// song_time = transport elapsed (since last play) + base offset
//
// The base offset is rewritten to the song-time at the reload instant on
// every reload (song start, seek, track toggle). Skipping that update
// desynchronizes lyrics and scoring without any error being raised, so
// reloads should go through `restart`.

use std::path::Path;

use super::transport::Transport;
use crate::error::TransportError;

pub struct PlaybackClock {
    transport: Box<dyn Transport>,
    base_offset_ms: u64,
}

impl PlaybackClock {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            base_offset_ms: 0,
        }
    }

    /// Song-time in ms; 0 while the transport is not running.
    pub fn current_time_ms(&self) -> u64 {
        let elapsed = self.transport.elapsed_ms();
        if elapsed < 0 {
            return 0;
        }
        elapsed as u64 + self.base_offset_ms
    }

    /// Record that the transport was just reloaded at `at_song_time_ms`.
    pub fn reload(&mut self, at_song_time_ms: u64) {
        self.base_offset_ms = at_song_time_ms;
    }

    /// Load `path`, play it from `at_song_time_ms` and update the offset.
    ///
    /// On failure the offset is left untouched.
    pub fn restart(&mut self, path: &Path, at_song_time_ms: u64) -> Result<(), TransportError> {
        self.transport.load(path)?;
        self.transport
            .play(Some(at_song_time_ms as f64 / 1000.0))?;
        self.reload(at_song_time_ms);
        Ok(())
    }

    pub fn base_offset_ms(&self) -> u64 {
        self.base_offset_ms
    }

    pub fn is_active(&self) -> bool {
        self.transport.is_active()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.transport.set_volume(volume.clamp(0.0, 1.0));
    }
}
