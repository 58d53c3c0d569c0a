//! voicelog — voice-to-text session recorder
//!
//! The core of the crate is [`SessionManager`], a recording-session
//! lifecycle state machine: it starts and stops audio capture, hands the
//! finished clip to a speech recognizer, persists the session record, and
//! notifies the display layer through [`EventSink`]. Recognition and
//! storage are external collaborators behind narrow traits.

#![deny(clippy::all)]

pub mod audio;
pub mod config;
pub mod session;
pub mod storage;
pub mod transcription;

pub use audio::{
    AudioChunk, AudioSource, CaptureError, CaptureOutcome, FrameBuffer, MicFactory, SourceFactory,
};
pub use config::Config;
pub use session::events::{DisplayEvent, EventKind, EventSink};
pub use session::state::SessionState;
pub use session::{SessionError, SessionManager};
pub use storage::{HistoryEntry, HistoryStore, SessionId, SqliteHistory, StorageError};
pub use transcription::{HttpTranscriber, Transcriber, TranscriptionError};
