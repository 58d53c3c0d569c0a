//! Recording session lifecycle management
//!
//! [`SessionManager`] owns the start/stop state machine and sequences the
//! post-capture pipeline: join the worker, encode the buffered audio,
//! transcribe it, persist the record, and notify the display layer. The
//! whole pipeline runs synchronously on the controller thread; a new
//! session cannot start until the previous one has fully finalized.
//!
//! Recognition failures never abort the pipeline. They are rendered as
//! diagnostic transcript text so every completed session leaves a record.

pub mod events;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::audio::{self, CaptureError, CaptureHandle, SourceFactory};
use crate::session::events::{DisplayEvent, EventSink};
use crate::session::state::SessionState;
use crate::storage::{HistoryEntry, HistoryStore, StorageError, TIMESTAMP_FORMAT};
use crate::transcription::{Transcriber, TranscriptionError};

/// Bound on waiting for the capture worker to exit after a stop
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by the session manager's command surface
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No capture device was available when the manager was built; the
    /// start control should be disabled
    #[error("No audio input device is available")]
    DeviceUnavailable,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to encode the captured audio: {0}")]
    Encode(#[from] hound::Error),
}

/// Mutable state for the one live session
struct ActiveSession {
    started_at: DateTime<Local>,
    handle: CaptureHandle,
}

/// The recording-session state machine
///
/// One instance manages at most one live session. All commands run on the
/// controller thread; the only other thread involved is the capture
/// worker, which never touches the manager.
pub struct SessionManager {
    state: SessionState,
    factory: Arc<dyn SourceFactory>,
    transcriber: Box<dyn Transcriber>,
    history: Box<dyn HistoryStore>,
    sink: Box<dyn EventSink>,
    active: Option<ActiveSession>,
    device_ready: bool,
    join_timeout: Duration,
}

impl SessionManager {
    /// Build a manager and probe the capture device once
    ///
    /// An unavailable device disables `start` and emits a single notice,
    /// mirroring a disabled record button; the manager itself stays
    /// usable for history queries.
    pub fn new(
        factory: Arc<dyn SourceFactory>,
        transcriber: Box<dyn Transcriber>,
        history: Box<dyn HistoryStore>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let device_ready = match factory.probe() {
            Ok(()) => true,
            Err(CaptureError::NoInputDevice) => {
                warn!("No audio input device detected");
                sink.on_event(DisplayEvent::notice(
                    "No microphone detected. Please connect a microphone and try again.",
                ));
                false
            }
            Err(e) => {
                warn!("Audio input device probe failed: {}", e);
                sink.on_event(DisplayEvent::notice(format!(
                    "Error accessing microphone: {}",
                    e
                )));
                false
            }
        };

        Self {
            state: SessionState::Idle,
            factory,
            transcriber,
            history,
            sink,
            active: None,
            device_ready,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// Override the bounded join wait; used by tests
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a capture device was available at construction
    pub fn device_ready(&self) -> bool {
        self.device_ready
    }

    /// Start a new recording session
    ///
    /// Valid only while idle; otherwise this is a logged no-op so a
    /// double-click on a record control cannot spawn a second worker.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            debug!("Ignoring start command in state {}", self.state);
            return Ok(());
        }
        if !self.device_ready {
            return Err(SessionError::DeviceUnavailable);
        }

        let started_at = Local::now();
        let handle = audio::start_capture(self.factory.clone());
        self.active = Some(ActiveSession { started_at, handle });
        self.state = SessionState::Recording;

        self.sink
            .on_event(DisplayEvent::notice("Recording started..."));
        info!("Recording started");
        Ok(())
    }

    /// Stop the live session and run the finalize pipeline to completion
    ///
    /// Does not return until the session is encoded, transcribed,
    /// persisted (or definitively not persisted), and announced. A no-op
    /// while idle.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Recording {
            debug!("Ignoring stop command in state {}", self.state);
            return Ok(());
        }

        self.state = SessionState::Finalizing;
        let result = self.finalize();
        self.state = SessionState::Idle;
        result
    }

    /// Stop any live session and release the capture device
    ///
    /// Runs the same pipeline as [`stop`](Self::stop) so a captured
    /// recording is never thrown away on exit. Idempotent.
    pub fn shutdown(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Recording => {
                info!("Shutting down with a live session; finalizing it first");
                self.stop()
            }
            _ => Ok(()),
        }
    }

    /// List all persisted sessions, ascending by start time
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        self.history.list_all()
    }

    fn finalize(&mut self) -> Result<(), SessionError> {
        let Some(active) = self.active.take() else {
            debug!("No active session to finalize");
            return Ok(());
        };

        // Join barrier: the frame buffer may only be read once the worker
        // has fully exited. A hung worker is a leaked device, reported
        // loudly instead of read around.
        let outcome = match active.handle.stop(self.join_timeout) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Capture worker failed to stop: {}", e);
                self.sink.on_event(DisplayEvent::notice(format!(
                    "Recording could not be finalized: {}",
                    e
                )));
                return Err(e.into());
            }
        };

        if outcome.degraded {
            warn!("Session degraded by device read failures");
            self.sink.on_event(DisplayEvent::notice(
                "Audio device failed during capture; transcribing what was recorded.",
            ));
        }

        let stopped_at = Local::now();
        let clip = outcome.frames.into_clip()?;

        let text = match self.transcriber.transcribe(&clip) {
            Ok(text) => text,
            Err(TranscriptionError::NoSpeechDetected) => "Could not understand audio.".to_string(),
            Err(TranscriptionError::ServiceUnavailable(detail)) => {
                format!("Could not reach recognition service: {}", detail)
            }
            Err(TranscriptionError::Other(detail)) => {
                format!("Transcription failed: {}", detail)
            }
        };

        self.sink.on_event(DisplayEvent::transcript(text.clone()));

        let start_time = active.started_at.format(TIMESTAMP_FORMAT).to_string();
        let stop_time = stopped_at.format(TIMESTAMP_FORMAT).to_string();
        match self.history.append(&start_time, &stop_time, &text) {
            Ok(id) => info!("Session {} persisted ({} -> {})", id, start_time, stop_time),
            Err(e) => {
                // The transcript was already delivered to the sink above,
                // so a storage outage loses nothing the caller saw.
                error!("Failed to persist session: {}", e);
                self.sink.on_event(DisplayEvent::notice(format!(
                    "Transcript was not saved: {}",
                    e
                )));
            }
        }

        self.sink.on_event(DisplayEvent::notice("Recording stopped."));
        info!("Recording stopped");
        Ok(())
    }
}
