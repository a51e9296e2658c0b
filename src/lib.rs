// Karaoke Core - live karaoke session engine
// Lyric timing, page-flip display, singing gate and microphone scoring

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod playback;
pub mod session;
pub mod testing;

// Re-exports for convenience
pub use analysis::{AudioAnalyzer, GateHandle, ScoreCounters};
pub use config::{AppConfig, AudioConfig, Difficulty, ScoringConfig, SessionConfig};
pub use error::{AudioError, ErrorCode, SessionError, TransportError};
pub use lyrics::{LyricLine, LyricTimeline, WordTiming};
pub use playback::{HeadlessTransport, PlaybackClock, SystemTimeSource, TimeSource, TrackKind, Transport};
pub use session::{
    KaraokeSession, LiveMetrics, RunMode, RunSummary, SessionCommand, SessionEvent,
    SessionEventKind, SessionRunner, SessionState, SongEntry, SongLibrary,
};
