//! Frame buffer collecting captured audio for one session
//!
//! The buffer has no locking of its own. It is moved into the capture
//! worker at session start and comes back to the controller through the
//! thread join, so there is never a concurrent reader and writer.

use std::io::Cursor;

use crate::audio::types::AudioChunk;
use crate::audio::{CHANNELS, SAMPLE_RATE};

/// Ordered, append-only sequence of audio chunks for a single session
#[derive(Debug, Default)]
pub struct FrameBuffer {
    chunks: Vec<AudioChunk>,
    total_samples: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a captured chunk, preserving insertion order
    pub fn append(&mut self, chunk: AudioChunk) {
        self.total_samples += chunk.len();
        self.chunks.push(chunk);
    }

    /// Number of chunks appended so far
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Drain the buffer into one WAV-encoded clip
    ///
    /// The clip is mono, 44.1 kHz, 16-bit signed little-endian PCM, the
    /// exact format the recognition service expects. An empty buffer
    /// yields a valid header-only clip.
    pub fn into_clip(self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for chunk in &self.chunks {
                for &sample in chunk.samples() {
                    writer.write_sample(sample)?;
                }
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}
