// Playback module - transport abstraction and song-time clock

pub mod clock;
pub mod headless;
pub mod time;
pub mod transport;

pub use clock::PlaybackClock;
pub use headless::HeadlessTransport;
pub use time::{StubTimeSource, SystemTimeSource, TimeSource};
pub use transport::{TrackKind, Transport};
