//! Pull-based seam over the audio input device
//!
//! The capture worker pulls fixed-size chunks through [`AudioSource`]
//! instead of talking to cpal directly, so tests can substitute a scripted
//! source. [`SourceFactory::open`] runs inside the worker thread because
//! `cpal::Stream` is not `Send`; the factory itself is, and is also what
//! the session manager probes at startup to decide whether the start
//! control is usable at all.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tracing::{error, info};

use crate::audio::types::{AudioChunk, CaptureError};
use crate::audio::{CHUNK_SAMPLES, SAMPLE_RATE};

/// How long a single device read may stall before it counts as a failure
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A stream of fixed-size audio chunks pulled by the capture worker
pub trait AudioSource {
    /// Read the next chunk from the device
    ///
    /// `Ok(None)` means no data is ready yet; the worker backs off briefly
    /// and asks again. Errors are per-read and recoverable from the
    /// caller's point of view.
    fn read_chunk(&mut self) -> Result<Option<AudioChunk>, CaptureError>;
}

/// Opens audio sources and answers availability probes
pub trait SourceFactory: Send + Sync {
    /// Check whether an input device is available without opening it
    fn probe(&self) -> Result<(), CaptureError>;

    /// Acquire the device; called on the capture worker thread
    fn open(&self) -> Result<Box<dyn AudioSource>, CaptureError>;
}

/// Factory for the default system microphone
pub struct MicFactory;

impl SourceFactory for MicFactory {
    fn probe(&self) -> Result<(), CaptureError> {
        cpal::default_host()
            .default_input_device()
            .map(|_| ())
            .ok_or(CaptureError::NoInputDevice)
    }

    fn open(&self) -> Result<Box<dyn AudioSource>, CaptureError> {
        MicSource::open().map(|source| Box::new(source) as Box<dyn AudioSource>)
    }
}

/// Microphone-backed audio source
///
/// cpal pushes samples from its callback; we bridge them into a channel
/// and reassemble fixed 1024-sample chunks on the pull side. Dropping the
/// source drops the stream, which releases the device.
pub struct MicSource {
    _stream: cpal::Stream,
    batch_rx: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
}

impl MicSource {
    fn open() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        // Find a config that can run at the fixed capture rate. The clip
        // format is not negotiable downstream, so an incompatible device
        // is an error rather than a silent rate change.
        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

        let mut best_config = None;
        for config in supported_configs {
            if config.channels() > 0
                && config.min_sample_rate().0 <= SAMPLE_RATE
                && config.max_sample_rate().0 >= SAMPLE_RATE
            {
                best_config = Some(config.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)));
                break;
            }
        }
        let supported_config = best_config.ok_or(CaptureError::NoSupportedConfig)?;
        let sample_format = supported_config.sample_format();

        let config: cpal::StreamConfig = supported_config.into();
        let channels = config.channels as usize;
        info!("Audio config: {} channels, {} Hz", channels, SAMPLE_RATE);

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<i16>>();

        let err_callback = |err| {
            error!("Audio stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    forward_samples(data, channels, &batch_tx);
                },
                err_callback,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    forward_samples(&samples, channels, &batch_tx);
                },
                err_callback,
                None,
            )?,
            sample_format => {
                return Err(CaptureError::UnsupportedFormat(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        stream.play()?;
        info!("Audio capture stream started");

        Ok(Self {
            _stream: stream,
            batch_rx,
            pending: VecDeque::new(),
        })
    }
}

impl AudioSource for MicSource {
    fn read_chunk(&mut self) -> Result<Option<AudioChunk>, CaptureError> {
        while self.pending.len() < CHUNK_SAMPLES {
            match self.batch_rx.recv_timeout(READ_TIMEOUT) {
                Ok(batch) => self.pending.extend(batch),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::ReadTimedOut),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::StreamClosed),
            }
        }
        let samples: Vec<i16> = self.pending.drain(..CHUNK_SAMPLES).collect();
        Ok(Some(AudioChunk::new(samples)))
    }
}

/// Downmix interleaved frames to mono and hand them to the pull side
///
/// Send failures mean the worker is gone; the stream is about to be torn
/// down, so they are ignored here.
fn forward_samples(data: &[i16], channels: usize, batch_tx: &Sender<Vec<i16>>) {
    if channels == 0 {
        return;
    }
    let mono: Vec<i16> = data.iter().step_by(channels).copied().collect();
    let _ = batch_tx.send(mono);
}
