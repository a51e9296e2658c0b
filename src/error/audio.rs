// Audio capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1009
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Requested input device does not exist
    pub const DEVICE_NOT_FOUND: i32 = 1001;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1002;

    /// Audio stream failed or disconnected while reading
    pub const STREAM_FAILURE: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1005;

    /// Audio configuration snapshot is invalid
    pub const INVALID_CONFIG: i32 = 1006;

    /// The analyzer thread could not be spawned
    pub const THREAD_SPAWN_FAILED: i32 = 1007;

    /// Analyzer is not running (already shut down)
    pub const NOT_RUNNING: i32 = 1008;

    /// A blocking read was interrupted by pause or shutdown
    pub const INTERRUPTED: i32 = 1009;
}

/// Log an audio error with structured context
///
/// Emits error_code, component and message fields on a single line so the
/// log stays greppable. Never panics.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioAnalyzer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio capture errors
///
/// These errors cover microphone device access, stream management and the
/// analyzer thread lifecycle.
///
/// Error code range: 1001-1009
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Requested input device does not exist
    DeviceNotFound { device: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Stream failed or disconnected while reading a chunk
    StreamFailure { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Audio configuration snapshot is invalid
    InvalidConfig { reason: String },

    /// Analyzer thread could not be spawned
    ThreadSpawnFailed { reason: String },

    /// Analyzer has been shut down
    NotRunning,

    /// Blocking read interrupted by pause or shutdown
    Interrupted,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::DeviceNotFound { .. } => AudioErrorCodes::DEVICE_NOT_FOUND,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::InvalidConfig { .. } => AudioErrorCodes::INVALID_CONFIG,
            AudioError::ThreadSpawnFailed { .. } => AudioErrorCodes::THREAD_SPAWN_FAILED,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::Interrupted => AudioErrorCodes::INTERRUPTED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::DeviceNotFound { device } => {
                format!("Input device not found: {}", device)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::InvalidConfig { reason } => {
                format!("Invalid audio configuration: {}", reason)
            }
            AudioError::ThreadSpawnFailed { reason } => {
                format!("Failed to spawn analyzer thread: {}", reason)
            }
            AudioError::NotRunning => {
                "Audio analyzer not running. It has already been shut down.".to_string()
            }
            AudioError::Interrupted => "Audio read interrupted".to_string(),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::DeviceNotFound {
                device: "mic".to_string()
            }
            .code(),
            AudioErrorCodes::DEVICE_NOT_FOUND
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(
            AudioError::StreamFailure {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_FAILURE
        );
        assert_eq!(
            AudioError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            AudioErrorCodes::LOCK_POISONED
        );
        assert_eq!(AudioError::NotRunning.code(), AudioErrorCodes::NOT_RUNNING);
        assert_eq!(AudioError::Interrupted.code(), AudioErrorCodes::INTERRUPTED);
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::DeviceNotFound {
            device: "USB Mic".to_string(),
        };
        assert_eq!(err.message(), "Input device not found: USB Mic");

        let err = AudioError::HardwareError {
            details: "test error".to_string(),
        };
        assert_eq!(err.message(), "Hardware error: test error");

        let err = AudioError::NotRunning;
        assert!(err.message().contains("not running"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::InvalidConfig {
            reason: "chunk_size must be > 0".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
