//! Speech recognition adapter
//!
//! The session manager hands a finished WAV clip to a [`Transcriber`] and
//! gets back either text or a typed failure. Every failure mode is a
//! value; nothing panics across this boundary, so the manager can render
//! outcomes deterministically.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// Why a clip produced no transcript
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// The service processed the clip but found nothing to recognize
    #[error("No speech detected in the recording")]
    NoSpeechDetected,

    /// The service could not be reached at all
    #[error("Recognition service unreachable: {0}")]
    ServiceUnavailable(String),

    /// Any other service-side failure
    #[error("Recognition failed: {0}")]
    Other(String),
}

/// Converts one encoded audio clip into text
pub trait Transcriber {
    fn transcribe(&self, clip: &[u8]) -> Result<String, TranscriptionError>;
}

/// Response body returned by the recognition endpoint
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    text: Option<String>,
}

/// Blocking HTTP client for a remote recognition service
///
/// POSTs the WAV clip as-is; the capture format is fixed so there is no
/// negotiation step. Runs blocking by design: the stop pipeline is
/// synchronous and must not return before recognition has settled.
pub struct HttpTranscriber {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: String, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, clip: &[u8]) -> Result<String, TranscriptionError> {
        debug!("Sending {} byte clip to {}", clip.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(clip.to_vec())
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    TranscriptionError::ServiceUnavailable(e.to_string())
                } else {
                    TranscriptionError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TranscriptionError::ServiceUnavailable(format!(
                "service returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(TranscriptionError::Other(format!(
                "service returned {}",
                status
            )));
        }

        let body: TranscriptResponse = response
            .json()
            .map_err(|e| TranscriptionError::Other(format!("malformed response: {}", e)))?;
        recognized_text(body.text)
    }
}

/// Treat a missing or blank transcript field as no speech
fn recognized_text(text: Option<String>) -> Result<String, TranscriptionError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(TranscriptionError::NoSpeechDetected),
    }
}
