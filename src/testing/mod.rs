//! Deterministic doubles for the session's external collaborators.
//!
//! `ManualTransport` reports exactly the elapsed time a test sets, and
//! `ScriptedCaptureBackend` serves microphone chunks at scripted levels.
//! Neither touches audio hardware, so session and analyzer behavior can be
//! exercised in CI.

mod capture;
mod transport;

pub use capture::{LevelHandle, ScriptedCaptureBackend};
pub use transport::ManualTransport;
