//! Audio types and error definitions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::frames::FrameBuffer;

/// One fixed-size block of raw PCM samples read from the input device
///
/// Chunks are mono, 16-bit signed, sampled at [`crate::audio::SAMPLE_RATE`].
/// They are created by the capture worker and never mutated after that.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    samples: Vec<i16>,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// PCM 16-bit signed samples (mono)
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What the capture worker hands back once its thread has exited
///
/// `degraded` is set when the worker gave up early after repeated device
/// read failures; the buffer still holds everything captured up to then.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub frames: FrameBuffer,
    pub degraded: bool,
}

/// Handle for controlling audio capture from outside the capture thread
///
/// Raising the stop flag asks the worker to finish its current read and
/// return. Ownership of the frame buffer transfers back through the join,
/// so nothing reads it while the worker is still alive.
pub struct CaptureHandle {
    pub(crate) stop_flag: Arc<AtomicBool>,
    pub(crate) thread: JoinHandle<CaptureOutcome>,
}

impl CaptureHandle {
    /// Stop capturing and wait for the worker thread to exit
    ///
    /// The wait is bounded: a worker that does not come back within `wait`
    /// is reported as [`CaptureError::WorkerHung`] rather than blocking the
    /// controller forever. The thread (and the device handle it owns) is
    /// leaked in that case, which callers must surface, not swallow.
    pub fn stop(self, wait: Duration) -> Result<CaptureOutcome, CaptureError> {
        self.stop_flag.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + wait;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                return Err(CaptureError::WorkerHung);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.thread.join().map_err(|_| CaptureError::WorkerPanicked)
    }

    /// Check if the worker thread is still running
    #[allow(dead_code)]
    pub fn is_capturing(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Errors that can occur during audio capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("No supported audio configuration found")]
    NoSupportedConfig,

    #[error("Audio configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    StreamError(#[from] cpal::BuildStreamError),

    #[error("Audio play error: {0}")]
    PlayError(#[from] cpal::PlayStreamError),

    #[error("Timed out waiting for audio from the input device")]
    ReadTimedOut,

    #[error("Audio input stream closed unexpectedly")]
    StreamClosed,

    #[error("Capture worker did not stop within the allotted time")]
    WorkerHung,

    #[error("Capture worker panicked")]
    WorkerPanicked,
}
