//! Recording session state

use std::fmt;

/// The lifecycle state of the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session in progress; `start` is accepted
    Idle,
    /// Capture worker is running and filling the frame buffer
    Recording,
    /// Capture has stopped; encoding, transcription, and persistence are
    /// still in flight
    Finalizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Finalizing => write!(f, "finalizing"),
        }
    }
}
