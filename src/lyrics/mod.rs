// Lyrics module - timed lyric lines for one song
//
// A LyricTimeline is built once per song load and is read-only afterwards.
// Whether a line carries word-level timing is decided at load time
// (LineTiming), so per-frame code never re-inspects the source format.

use serde::Serialize;

pub mod loader;

pub use loader::{
    load_timeline, parse_legacy, parse_structured, resolve_timing_source, TimingFormat,
    DEFAULT_LINE_MS,
};

/// Timing of one displayed word (or syllable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordTiming {
    pub display_text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Shape of a line, resolved once at load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "words", rename_all = "snake_case")]
pub enum LineTiming {
    Plain,
    WordTimed(Vec<WordTiming>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LyricLine {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub timing: LineTiming,
}

impl LyricLine {
    /// Line without word timing
    pub fn plain(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms: end_ms.max(start_ms),
            text: text.into(),
            timing: LineTiming::Plain,
        }
    }

    /// Line with word timing; an empty word list degrades to a plain line.
    pub fn word_timed(
        start_ms: u64,
        end_ms: u64,
        text: impl Into<String>,
        words: Vec<WordTiming>,
    ) -> Self {
        let timing = if words.is_empty() {
            LineTiming::Plain
        } else {
            LineTiming::WordTimed(words)
        };
        Self {
            start_ms,
            end_ms: end_ms.max(start_ms),
            text: text.into(),
            timing,
        }
    }

    pub fn words(&self) -> &[WordTiming] {
        match &self.timing {
            LineTiming::Plain => &[],
            LineTiming::WordTimed(words) => words,
        }
    }

    /// Singing window check, inclusive at both ends
    pub fn contains(&self, song_time_ms: u64) -> bool {
        self.start_ms <= song_time_ms && song_time_ms <= self.end_ms
    }
}

/// Ordered lyric lines plus source metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LyricTimeline {
    lines: Vec<LyricLine>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl LyricTimeline {
    /// Build a timeline; lines are stable-sorted by start time.
    pub fn new(mut lines: Vec<LyricLine>) -> Self {
        lines.sort_by_key(|line| line.start_ms);
        Self {
            lines,
            title: None,
            artist: None,
        }
    }

    pub fn with_metadata(mut self, title: Option<String>, artist: Option<String>) -> Self {
        self.title = title;
        self.artist = artist;
        self
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// End of the last line, 0 for an empty timeline
    pub fn duration_ms(&self) -> u64 {
        self.lines.iter().map(|line| line.end_ms).max().unwrap_or(0)
    }
}
