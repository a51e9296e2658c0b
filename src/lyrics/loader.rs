//! Lyric timing file loaders.
//!
//! Two source formats are understood:
//! - legacy LRC text, one `[mm:ss.xx] text` tag per line, no end times
//! - structured JSON with line and word start/end times in seconds
//!
//! Loading never fails: a missing or malformed source produces an empty
//! timeline and a warning so the session can continue audio-only.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::{LyricLine, LyricTimeline, WordTiming};

/// Line duration used when the source has no end time
pub const DEFAULT_LINE_MS: u64 = 5000;

static TIMESTAMP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+):(\d+\.\d+)\](.*)").expect("timestamp pattern is valid")
});

static METADATA_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(ti|ar):([^\]]*)\]").expect("metadata pattern is valid"));

/// Format of a timing source, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingFormat {
    Structured,
    Legacy,
}

impl TimingFormat {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TimingFormat::Structured,
            _ => TimingFormat::Legacy,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StructuredDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    lines: Vec<StructuredLine>,
}

#[derive(Debug, Deserialize)]
struct StructuredLine {
    start: f64,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<StructuredWord>,
}

#[derive(Debug, Deserialize)]
struct StructuredWord {
    display: String,
    start: f64,
    end: f64,
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Parse legacy LRC text.
///
/// Each line is searched for its first `[minutes:seconds.fraction]` tag; the
/// rest of the line (trimmed) is the lyric. Lines without a tag are ignored,
/// except `[ti:]` and `[ar:]` which fill the title and artist.
pub fn parse_legacy(contents: &str, default_line_ms: u64) -> LyricTimeline {
    let mut title = None;
    let mut artist = None;
    let mut lines = Vec::new();

    for raw in contents.lines() {
        if let Some(caps) = TIMESTAMP_TAG.captures(raw) {
            let minutes: u64 = caps[1].parse().unwrap_or(0);
            let seconds: f64 = caps[2].parse().unwrap_or(0.0);
            let start_ms = seconds_to_ms(minutes as f64 * 60.0 + seconds);
            let text = caps[3].trim();
            lines.push(LyricLine::plain(
                start_ms,
                start_ms + default_line_ms,
                text,
            ));
        } else if let Some(caps) = METADATA_TAG.captures(raw) {
            let value = caps[2].trim().to_string();
            match &caps[1] {
                "ti" => title = Some(value),
                _ => artist = Some(value),
            }
        }
    }

    LyricTimeline::new(lines).with_metadata(title, artist)
}

/// Parse structured JSON timing.
///
/// Times are seconds in the file and milliseconds in the timeline. A line
/// without `end` gets `start + default_line_ms`; a line without `text` is
/// rebuilt from its words.
pub fn parse_structured(
    contents: &str,
    default_line_ms: u64,
) -> Result<LyricTimeline, serde_json::Error> {
    let document: StructuredDocument = serde_json::from_str(contents)?;

    let lines = document
        .lines
        .into_iter()
        .map(|line| {
            let start_ms = seconds_to_ms(line.start);
            let end_ms = line
                .end
                .map(seconds_to_ms)
                .unwrap_or(start_ms + default_line_ms);
            let words: Vec<WordTiming> = line
                .words
                .into_iter()
                .map(|word| {
                    let word_start = seconds_to_ms(word.start);
                    WordTiming {
                        display_text: word.display,
                        start_ms: word_start,
                        end_ms: seconds_to_ms(word.end).max(word_start),
                    }
                })
                .collect();
            let text = if line.text.trim().is_empty() {
                words
                    .iter()
                    .map(|w| w.display_text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                line.text.trim().to_string()
            };
            LyricLine::word_timed(start_ms, end_ms, text, words)
        })
        .collect();

    Ok(LyricTimeline::new(lines).with_metadata(document.title, document.artist))
}

/// Load a timing file; total, never returns an error.
pub fn load_timeline<P: AsRef<Path>>(path: P, default_line_ms: u64) -> LyricTimeline {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            log::warn!(
                "[Lyrics] Failed to read timing file {:?}: {}. Continuing without lyrics.",
                path,
                err
            );
            return LyricTimeline::empty();
        }
    };

    let timeline = match TimingFormat::detect(path) {
        TimingFormat::Legacy => parse_legacy(&contents, default_line_ms),
        TimingFormat::Structured => match parse_structured(&contents, default_line_ms) {
            Ok(timeline) => timeline,
            Err(err) => {
                log::warn!(
                    "[Lyrics] Failed to parse JSON timing from {:?}: {}. Continuing without lyrics.",
                    path,
                    err
                );
                return LyricTimeline::empty();
            }
        },
    };

    log::info!(
        "[Lyrics] Loaded {} lines from {:?}",
        timeline.len(),
        path
    );
    timeline
}

/// Pick the timing file to use for a song at start time.
///
/// For a `.lrc` path the sibling `<stem>_lyrics.json` wins when it exists;
/// anything else is returned unchanged.
pub fn resolve_timing_source(lrc_path: &Path) -> PathBuf {
    let is_lrc = lrc_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("lrc"))
        .unwrap_or(false);
    if !is_lrc {
        return lrc_path.to_path_buf();
    }

    let Some(stem) = lrc_path.file_stem().and_then(|s| s.to_str()) else {
        return lrc_path.to_path_buf();
    };
    let structured = lrc_path.with_file_name(format!("{}_lyrics.json", stem));
    if structured.exists() {
        structured
    } else {
        lrc_path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::LineTiming;

    const SAMPLE_LRC: &str = "[ti:Evidências]\n\
        [ar:Chitãozinho & Xororó]\n\
        [00:12.50] Quando eu digo que deixei de te amar\n\
        not a lyric line\n\
        [01:02.00]É porque eu te amo\n\
        [00:05.25]   intro  \n";

    #[test]
    fn test_parse_legacy_lines_and_metadata() {
        let timeline = parse_legacy(SAMPLE_LRC, DEFAULT_LINE_MS);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.title.as_deref(), Some("Evidências"));
        assert_eq!(timeline.artist.as_deref(), Some("Chitãozinho & Xororó"));

        let first = &timeline.lines()[0];
        assert_eq!(first.start_ms, 5250);
        assert_eq!(first.end_ms, 10250);
        assert_eq!(first.text, "intro");
        assert_eq!(first.timing, LineTiming::Plain);

        assert_eq!(timeline.lines()[1].start_ms, 12500);
        assert_eq!(timeline.lines()[2].start_ms, 62000);
        assert_eq!(timeline.lines()[2].text, "É porque eu te amo");
    }

    #[test]
    fn test_legacy_tag_found_anywhere_in_line() {
        let timeline = parse_legacy("prefix [00:01.00]hello", 1000);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.lines()[0].start_ms, 1000);
        assert_eq!(timeline.lines()[0].end_ms, 2000);
    }

    #[test]
    fn test_parse_structured() {
        let json = r#"{
            "id": "1234",
            "title": "Song",
            "lines": [
                { "start": 3.0, "end": 4.5, "text": "second",
                  "words": [ { "display": "sec", "start": 3.0, "end": 3.5 },
                             { "display": "ond", "start": 3.5, "end": 4.5 } ] },
                { "start": 1.0, "end": 2.0, "text": "first", "words": [] }
            ]
        }"#;
        let timeline = parse_structured(json, DEFAULT_LINE_MS).unwrap();
        assert_eq!(timeline.title.as_deref(), Some("Song"));
        assert_eq!(timeline.len(), 2);

        let first = &timeline.lines()[0];
        assert_eq!((first.start_ms, first.end_ms), (1000, 2000));
        assert_eq!(first.timing, LineTiming::Plain);

        let second = &timeline.lines()[1];
        assert_eq!(second.words().len(), 2);
        assert_eq!(second.words()[1].start_ms, 3500);
        assert_eq!(second.words()[1].end_ms, 4500);
    }

    #[test]
    fn test_structured_defaults() {
        let json = r#"{ "lines": [ { "start": 2.0,
            "words": [ { "display": "a", "start": 2.0, "end": 1.0 },
                       { "display": "b", "start": 2.2, "end": 2.4 } ] } ] }"#;
        let timeline = parse_structured(json, DEFAULT_LINE_MS).unwrap();
        let line = &timeline.lines()[0];
        assert_eq!(line.end_ms, 7000);
        assert_eq!(line.text, "a b");
        assert_eq!(line.words()[0].end_ms, 2000);
    }

    #[test]
    fn test_malformed_sources_yield_empty_timeline() {
        let dir = std::env::temp_dir();
        let bad_json = dir.join("karaoke_core_bad_lyrics.json");
        fs::write(&bad_json, "{ not json").unwrap();
        assert!(load_timeline(&bad_json, DEFAULT_LINE_MS).is_empty());
        let _ = fs::remove_file(bad_json);

        assert!(load_timeline(dir.join("karaoke_core_missing.lrc"), DEFAULT_LINE_MS).is_empty());
    }

    #[test]
    fn test_resolve_prefers_structured_sibling() {
        let dir = std::env::temp_dir().join("karaoke_core_resolve");
        fs::create_dir_all(&dir).unwrap();
        let lrc = dir.join("song.lrc");
        let json = dir.join("song_lyrics.json");
        fs::write(&lrc, "[00:01.00]x").unwrap();
        let _ = fs::remove_file(&json);

        assert_eq!(resolve_timing_source(&lrc), lrc);
        fs::write(&json, r#"{"lines": []}"#).unwrap();
        assert_eq!(resolve_timing_source(&lrc), json);

        let other = dir.join("song.txt");
        assert_eq!(resolve_timing_source(&other), other);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            TimingFormat::detect(Path::new("a/b_lyrics.JSON")),
            TimingFormat::Structured
        );
        assert_eq!(TimingFormat::detect(Path::new("a/b.lrc")), TimingFormat::Legacy);
        assert_eq!(TimingFormat::detect(Path::new("noext")), TimingFormat::Legacy);
    }
}
