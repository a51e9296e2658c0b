// PaginationEngine - which pair of lyric lines is on screen
//
// Lines are shown two at a time starting at an even page_index. The page
// turns only after the *bottom* line of the pair has ended, so the singer
// always sees the next line before it starts. A trailing unpaired line
// (odd line count) turns on its own end time.

use crate::lyrics::{LyricLine, LyricTimeline};

/// Lines shown per page
pub const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationEngine {
    page_index: usize,
}

impl PaginationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the top displayed line; always even.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Turn the page at most once for `song_time_ms`.
    ///
    /// Returns true when the page turned.
    pub fn advance(&mut self, timeline: &LyricTimeline, song_time_ms: u64) -> bool {
        if should_turn(self.page_index, timeline.lines(), song_time_ms) {
            self.page_index += PAGE_SIZE;
            true
        } else {
            false
        }
    }

    /// Back to the first page (song start).
    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Fast-forward from the first page to the page for `song_time_ms` (seek).
    pub fn reset_to(&mut self, timeline: &LyricTimeline, song_time_ms: u64) {
        self.page_index = 0;
        while should_turn(self.page_index, timeline.lines(), song_time_ms) {
            self.page_index += PAGE_SIZE;
        }
    }

    /// Top and bottom line of the current page; never indexes out of range.
    pub fn visible_lines<'a>(
        &self,
        timeline: &'a LyricTimeline,
    ) -> (Option<&'a LyricLine>, Option<&'a LyricLine>) {
        (
            timeline.get(self.page_index),
            timeline.get(self.page_index + 1),
        )
    }
}

fn should_turn(page_index: usize, lines: &[LyricLine], song_time_ms: u64) -> bool {
    let boundary = if page_index + 1 < lines.len() {
        lines[page_index + 1].end_ms
    } else if page_index < lines.len() {
        lines[page_index].end_ms
    } else {
        return false;
    };
    song_time_ms > boundary
}

/// Index of the line being sung at `song_time_ms`, if any.
///
/// Keeps the last line whose start (minus `preroll_ms`) has been reached and
/// stops at the first line that has not, relying on the start-time order.
pub fn current_line(timeline: &LyricTimeline, song_time_ms: u64, preroll_ms: u64) -> Option<usize> {
    let mut found = None;
    for (index, line) in timeline.lines().iter().enumerate() {
        if line.start_ms <= song_time_ms.saturating_add(preroll_ms) {
            found = Some(index);
        } else {
            break;
        }
    }
    found
}
