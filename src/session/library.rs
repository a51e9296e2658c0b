//! Song library (`library.json`).
//!
//! A JSON object keyed by song code. The library is read at session start;
//! a missing or corrupt file gives an empty library rather than an error,
//! matching how configuration is loaded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::playback::TrackKind;

/// One playable song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Instrumental (backing) track
    pub audio_path: PathBuf,
    /// Original recording with vocals, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_audio_path: Option<PathBuf>,
    /// Legacy timing file; a structured sibling is preferred at song start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lrc_path: Option<PathBuf>,
}

impl SongEntry {
    /// Audio file for the given rendition
    pub fn track_path(&self, kind: TrackKind) -> Option<&Path> {
        match kind {
            TrackKind::Instrumental => Some(self.audio_path.as_path()),
            TrackKind::Vocal => self.original_audio_path.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongLibrary {
    songs: BTreeMap<String, SongEntry>,
}

impl SongLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the library, or an empty one if the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "[Library] Failed to read library {:?}: {}. Starting with an empty library.",
                    path,
                    err
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<BTreeMap<String, SongEntry>>(&contents) {
            Ok(songs) => {
                log::info!("[Library] Loaded {} songs from {:?}", songs.len(), path);
                Self { songs }
            }
            Err(err) => {
                log::warn!(
                    "[Library] Failed to parse library {:?}: {}. Starting with an empty library.",
                    path,
                    err
                );
                Self::default()
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let path = path.as_ref();
        let io_error = |reason: String| SessionError::Io {
            path: path.display().to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(&self.songs).map_err(|e| io_error(e.to_string()))?;
        fs::write(path, json).map_err(|e| io_error(e.to_string()))
    }

    /// Add or replace a song under its own id.
    pub fn insert(&mut self, entry: SongEntry) {
        self.songs.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&SongEntry> {
        self.songs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.songs.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.songs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
