//! Configuration management for the karaoke session
//!
//! This module provides runtime configuration loading from JSON files.
//! The audio section doubles as the snapshot pushed to the analyzer
//! whenever the user edits settings, so it is cheap to clone and compare.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AudioError;

/// Device identifier meaning "no device in this slot"
pub const DEVICE_NONE: &str = "none";

/// Device identifier meaning "the host's default input"
pub const DEVICE_DEFAULT: &str = "default";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Scoring difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Audio capture snapshot applied to the analyzer as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// First microphone: device name, "default" or "none"
    pub input_device_1: String,
    /// Second microphone: device name, "default" or "none"
    pub input_device_2: String,
    /// Route microphone input to the monitor output (passed through only)
    pub monitoring_enabled: bool,
    /// Samples per analyzer read
    pub chunk_size: usize,
    /// Requested capture sample rate in Hz
    pub sample_rate: u32,
    pub difficulty: Difficulty,
    pub mic1_gain: f32,
    pub mic2_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device_1: DEVICE_DEFAULT.to_string(),
            input_device_2: DEVICE_NONE.to_string(),
            monitoring_enabled: false,
            chunk_size: 1024,
            sample_rate: 44_100,
            difficulty: Difficulty::Normal,
            mic1_gain: 1.0,
            mic2_gain: 1.0,
        }
    }
}

/// One configured input slot resolved from [`AudioConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct InputSlot {
    pub slot: usize,
    pub device: String,
    pub gain: f32,
}

impl AudioConfig {
    /// Inputs that are actually configured, in slot order.
    pub fn active_inputs(&self) -> Vec<InputSlot> {
        [
            (0, &self.input_device_1, self.mic1_gain),
            (1, &self.input_device_2, self.mic2_gain),
        ]
        .into_iter()
        .filter(|(_, device, _)| !is_none_device(device))
        .map(|(slot, device, gain)| InputSlot {
            slot,
            device: device.clone(),
            gain,
        })
        .collect()
    }

    /// Reject snapshots the analyzer cannot run with.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.chunk_size == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "chunk_size must be greater than 0".to_string(),
            });
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "sample_rate must be greater than 0".to_string(),
            });
        }
        for gain in [self.mic1_gain, self.mic2_gain] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(AudioError::InvalidConfig {
                    reason: format!("gain must be a finite value >= 0 (got {})", gain),
                });
            }
        }
        Ok(())
    }

    /// True when moving between the two snapshots needs no device reopen.
    pub fn same_devices(&self, other: &AudioConfig) -> bool {
        self.input_device_1 == other.input_device_1
            && self.input_device_2 == other.input_device_2
            && self.chunk_size == other.chunk_size
            && self.sample_rate == other.sample_rate
    }
}

fn is_none_device(device: &str) -> bool {
    device.is_empty() || device.eq_ignore_ascii_case(DEVICE_NONE)
}

/// Energy thresholds per difficulty, on the 16-bit sample scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub easy_threshold: f64,
    pub normal_threshold: f64,
    pub hard_threshold: f64,
    /// How long stop/shutdown wait for the analyzer to acknowledge
    pub stop_grace_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            easy_threshold: 5.0,
            normal_threshold: 10.0,
            hard_threshold: 20.0,
            stop_grace_ms: 100,
        }
    }
}

impl ScoringConfig {
    pub fn threshold_for(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy_threshold,
            Difficulty::Normal => self.normal_threshold,
            Difficulty::Hard => self.hard_threshold,
        }
    }

    /// Hard >= Normal >= Easy must hold, otherwise harder tiers would score higher.
    pub fn is_monotonic(&self) -> bool {
        self.easy_threshold <= self.normal_threshold && self.normal_threshold <= self.hard_threshold
    }
}

/// Session loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// UI tick rate
    pub tick_hz: u32,
    /// Current-line lookup opens this many ms before a line starts
    pub preroll_ms: u64,
    /// Line duration used when a timing source omits the end time
    pub default_line_ms: u64,
    pub library_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            preroll_ms: 200,
            default_line_ms: 5000,
            library_path: "library.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing or invalid.
    /// A non-monotonic threshold table is also replaced by the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let config: Self = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        };

        if !config.scoring.is_monotonic() {
            log::warn!(
                "[Config] Difficulty thresholds are not monotonic ({:?}). Using default thresholds.",
                config.scoring
            );
            return Self {
                scoring: ScoringConfig::default(),
                ..config
            };
        }
        config
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/karaoke_config.json")
    }
}
