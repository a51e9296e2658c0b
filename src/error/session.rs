// Transport and session error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

use super::AudioError;

/// Transport error code constants
///
/// Error code range: 2001-2004
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    /// Audio file does not exist
    pub const FILE_NOT_FOUND: i32 = 2001;

    /// File format is not supported by the transport
    pub const UNSUPPORTED_FORMAT: i32 = 2002;

    /// File exists but could not be decoded
    pub const DECODE_FAILED: i32 = 2003;

    /// `play` called before a successful `load`
    pub const NOT_LOADED: i32 = 2004;
}

/// Session error code constants
///
/// Error code range: 3001-3005
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Song id is not in the library
    pub const UNKNOWN_SONG: i32 = 3001;

    /// Command is not valid in the current session state
    pub const INVALID_STATE: i32 = 3002;

    /// Transport failed to load or play
    pub const TRANSPORT: i32 = 3003;

    /// Audio analyzer failure surfaced to the session
    pub const AUDIO: i32 = 3004;

    /// Library or configuration file could not be read or written
    pub const IO: i32 = 3005;
}

/// Log a transport error with structured context
pub fn log_transport_error(err: &TransportError, context: &str) {
    error!(
        "Transport error in {}: code={}, component=Transport, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=KaraokeSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by an audio transport implementation
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Audio file does not exist
    FileNotFound { path: String },

    /// File extension or codec is not supported
    UnsupportedFormat { path: String },

    /// Decoder rejected the file
    DecodeFailed { path: String, reason: String },

    /// Nothing has been loaded yet
    NotLoaded,
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::FileNotFound { .. } => TransportErrorCodes::FILE_NOT_FOUND,
            TransportError::UnsupportedFormat { .. } => TransportErrorCodes::UNSUPPORTED_FORMAT,
            TransportError::DecodeFailed { .. } => TransportErrorCodes::DECODE_FAILED,
            TransportError::NotLoaded => TransportErrorCodes::NOT_LOADED,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::FileNotFound { path } => format!("Audio file not found: {}", path),
            TransportError::UnsupportedFormat { path } => {
                format!("Unsupported audio format: {}", path)
            }
            TransportError::DecodeFailed { path, reason } => {
                format!("Could not decode {}: {}", path, reason)
            }
            TransportError::NotLoaded => "No audio loaded. Call load() first.".to_string(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}

/// Errors surfaced by the session state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Song id is not in the library
    UnknownSong { id: String },

    /// Command not valid in the current state
    InvalidState { state: String, action: String },

    /// Transport failure during song start, toggle or seek
    Transport(TransportError),

    /// Audio analyzer failure
    Audio(AudioError),

    /// File could not be read or written
    Io { path: String, reason: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::UnknownSong { .. } => SessionErrorCodes::UNKNOWN_SONG,
            SessionError::InvalidState { .. } => SessionErrorCodes::INVALID_STATE,
            SessionError::Transport(_) => SessionErrorCodes::TRANSPORT,
            SessionError::Audio(_) => SessionErrorCodes::AUDIO,
            SessionError::Io { .. } => SessionErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::UnknownSong { id } => format!("Invalid song code: {}", id),
            SessionError::InvalidState { state, action } => {
                format!("Cannot {} while in state {}", action, state)
            }
            SessionError::Transport(err) => err.message(),
            SessionError::Audio(err) => err.message(),
            SessionError::Io { path, reason } => format!("I/O error on {}: {}", path, reason),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Transport(err) => Some(err),
            SessionError::Audio(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        SessionError::Audio(err)
    }
}
