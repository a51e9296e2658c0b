// Error types for the karaoke core
//
// This module defines custom error types for capture, transport and session
// operations, providing structured error handling with stable error codes.

mod audio;
mod session;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use session::{
    log_session_error, log_transport_error, SessionError, SessionErrorCodes, TransportError,
    TransportErrorCodes,
};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so front-ends can map failures to user-visible
/// text without matching on every variant.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
