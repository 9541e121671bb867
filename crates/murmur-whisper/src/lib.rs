//! Murmur Whisper crate - speech-to-text service abstraction.
//!
//! Provides a trait-based abstraction for transcription, a Whisper-backed
//! implementation (feature-gated), and mock implementations for testing the
//! session pipeline without loading a real model.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use murmur_core::error::MurmurError;

pub mod whisper_service;

pub use whisper_service::WhisperService;

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing audio data to text.
///
/// The call is expected to be slow relative to the audio duration and is
/// never subject to a timeout; callers serialize invocations through a
/// single worker.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe audio data into text.
    ///
    /// # Arguments
    /// * `audio_data` - PCM audio samples as f32 values in [-1.0, 1.0].
    /// * `sample_rate` - Sample rate of the audio data in Hz (e.g., 16000).
    ///
    /// # Returns
    /// The transcribed text, possibly empty when no speech was recognized.
    fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> impl Future<Output = Result<String, MurmurError>> + Send;
}

// =============================================================================
// Mock implementations
// =============================================================================

/// Mock transcription service returning a fixed text.
///
/// Used for testing and development without a real Whisper model. Counts
/// invocations so tests can assert call patterns.
#[derive(Debug, Default)]
pub struct MockTranscriptionService {
    text: String,
    calls: AtomicUsize,
}

impl MockTranscriptionService {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of transcribe calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<String, MurmurError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if audio_data.is_empty() {
            return Err(MurmurError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(MurmurError::Transcription(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        tracing::debug!(
            samples = audio_data.len(),
            sample_rate,
            "Mock transcription generated"
        );
        Ok(self.text.clone())
    }
}

/// Scripted mock that pops one response per call, with optional per-call
/// latency. Useful for exercising FIFO ordering and failure isolation in
/// the worker.
#[derive(Debug, Default)]
pub struct ScriptedTranscriptionService {
    responses: Mutex<Vec<(Duration, Result<String, MurmurError>)>>,
}

impl ScriptedTranscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response, returned after `delay`.
    pub fn push_ok(&self, delay: Duration, text: &str) {
        self.responses
            .lock()
            .expect("response mutex poisoned")
            .push((delay, Ok(text.to_string())));
    }

    /// Queue a failed response, returned after `delay`.
    pub fn push_err(&self, delay: Duration, message: &str) {
        self.responses
            .lock()
            .expect("response mutex poisoned")
            .push((delay, Err(MurmurError::Transcription(message.to_string()))));
    }
}

impl TranscriptionService for ScriptedTranscriptionService {
    async fn transcribe(
        &self,
        _audio_data: &[f32],
        _sample_rate: u32,
    ) -> Result<String, MurmurError> {
        let next = {
            let mut responses = self.responses.lock().expect("response mutex poisoned");
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };

        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(MurmurError::Transcription(
                "No scripted response remaining".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
