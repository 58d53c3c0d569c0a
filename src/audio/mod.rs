//! Audio capture on a dedicated worker thread
//!
//! [`start_capture`] spawns the worker for one recording session. The
//! worker opens the device itself, pulls fixed-size chunks into a frame
//! buffer it owns exclusively, and hands the buffer back through the
//! thread join when the stop flag is raised. Read failures are tolerated
//! per iteration; a streak of them degrades the session and ends capture
//! early with whatever was buffered.

pub mod frames;
pub mod source;
mod types;

pub use frames::FrameBuffer;
pub use source::{AudioSource, MicFactory, SourceFactory};
pub use types::{AudioChunk, CaptureError, CaptureHandle, CaptureOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

/// Fixed capture sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// Fixed channel count (mono)
pub const CHANNELS: u16 = 1;

/// Samples per chunk read from the device
pub const CHUNK_SAMPLES: usize = 1024;

/// Consecutive read failures tolerated before the session degrades
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 3;

/// Back-off when the source has no data ready
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Start audio capture on a dedicated worker thread
///
/// The returned handle is the only way to reach the frame buffer: raising
/// the stop flag and joining transfers ownership back to the caller.
pub(crate) fn start_capture(factory: Arc<dyn SourceFactory>) -> CaptureHandle {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let worker_flag = stop_flag.clone();
    let thread = thread::spawn(move || run_worker(factory.as_ref(), &worker_flag));
    CaptureHandle { stop_flag, thread }
}

/// Capture loop, run on the worker thread
///
/// The source is acquired and dropped inside this function, so the device
/// is released on every exit path, including the degraded ones.
fn run_worker(factory: &dyn SourceFactory, stop_flag: &AtomicBool) -> CaptureOutcome {
    let mut frames = FrameBuffer::new();

    let mut source = match factory.open() {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open audio source: {}", e);
            return CaptureOutcome {
                frames,
                degraded: true,
            };
        }
    };

    let mut consecutive_failures = 0u32;
    let mut degraded = false;

    while !stop_flag.load(Ordering::SeqCst) {
        match source.read_chunk() {
            Ok(Some(chunk)) => {
                consecutive_failures = 0;
                frames.append(chunk);
            }
            Ok(None) => thread::sleep(IDLE_POLL),
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    "Audio read failed ({}/{}): {}",
                    consecutive_failures, MAX_CONSECUTIVE_READ_FAILURES, e
                );
                if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                    error!("Giving up on the audio device; finishing with buffered audio");
                    degraded = true;
                    break;
                }
            }
        }
    }

    info!(
        "Capture worker exiting: {} chunks, {} samples",
        frames.len(),
        frames.total_samples()
    );
    CaptureOutcome { frames, degraded }
}
