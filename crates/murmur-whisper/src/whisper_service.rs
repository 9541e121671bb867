//! Real Whisper transcription service via whisper-rs (whisper.cpp bindings).
//!
//! When compiled with the `whisper` feature, loads a GGML model file and runs
//! speech-to-text inference on raw PCM audio. The model is expensive (hundreds
//! of MB resident), so it is loaded once on first use and held for the process
//! lifetime. Without the feature, provides an error stub.

#[cfg(feature = "whisper")]
use std::path::Path;
#[cfg(feature = "whisper")]
use std::sync::OnceLock;

use murmur_core::config::WhisperConfig;
use murmur_core::error::MurmurError;

use crate::TranscriptionService;

/// Whisper transcription service backed by whisper.cpp.
///
/// The model context is lazily initialized on the first `transcribe` call
/// and never reloaded. Construction only validates that the model file
/// exists.
pub struct WhisperService {
    #[cfg(feature = "whisper")]
    ctx: OnceLock<whisper_rs::WhisperContext>,
    config: WhisperConfig,
}

impl WhisperService {
    /// Create a new WhisperService.
    ///
    /// # Errors
    /// Returns `MurmurError::Transcription` if the model file doesn't exist.
    /// The model itself is not loaded until the first transcription.
    #[cfg(feature = "whisper")]
    pub fn new(config: WhisperConfig) -> Result<Self, MurmurError> {
        if !Path::new(&config.model_path).exists() {
            return Err(MurmurError::Transcription(format!(
                "Whisper model file not found: {}",
                config.model_path
            )));
        }

        Ok(Self {
            ctx: OnceLock::new(),
            config,
        })
    }

    /// Stub constructor when the `whisper` feature is disabled.
    #[cfg(not(feature = "whisper"))]
    pub fn new(config: WhisperConfig) -> Result<Self, MurmurError> {
        tracing::warn!(
            "WhisperService created without `whisper` feature — transcription will fail"
        );
        Ok(Self { config })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    /// Load the model context on first use.
    #[cfg(feature = "whisper")]
    fn context(&self) -> Result<&whisper_rs::WhisperContext, MurmurError> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        if let Some(ctx) = self.ctx.get() {
            return Ok(ctx);
        }

        tracing::info!(
            model = %self.config.model_path,
            lang = %self.config.language,
            "Loading Whisper model"
        );

        let params = WhisperContextParameters::default();
        let ctx =
            WhisperContext::new_with_params(&self.config.model_path, params).map_err(|e| {
                MurmurError::Transcription(format!("Failed to load Whisper model: {}", e))
            })?;

        tracing::info!("Whisper model loaded");
        // A concurrent caller may have won the race; either context is valid.
        let _ = self.ctx.set(ctx);
        self.ctx
            .get()
            .ok_or_else(|| MurmurError::Transcription("Model context unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Real implementation (whisper feature enabled)
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<String, MurmurError> {
        use whisper_rs::{FullParams, SamplingStrategy};

        if audio_data.is_empty() {
            return Err(MurmurError::Transcription(
                "Cannot transcribe empty audio data".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(MurmurError::Transcription(
                "Sample rate must be greater than 0".into(),
            ));
        }

        // Whisper expects 16 kHz mono PCM. Resample if needed.
        let samples_16k = if sample_rate != 16_000 {
            resample(audio_data, sample_rate, 16_000)
        } else {
            audio_data.to_vec()
        };

        let duration_secs = samples_16k.len() as f32 / 16_000.0;
        tracing::debug!(
            samples = samples_16k.len(),
            duration_secs,
            "Starting Whisper transcription"
        );

        let ctx = self.context()?;

        // Run inference (synchronous — whisper.cpp is CPU-bound).
        let mut state = ctx.create_state().map_err(|e| {
            MurmurError::Transcription(format!("Failed to create Whisper state: {}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang = if self.config.language == "auto" {
            None
        } else {
            Some(self.config.language.as_str())
        };
        params.set_language(lang);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples_16k)
            .map_err(|e| MurmurError::Transcription(format!("Whisper inference failed: {}", e)))?;

        let n_segments = state.full_n_segments().map_err(|e| {
            MurmurError::Transcription(format!("Failed to get segment count: {}", e))
        })?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state.full_get_segment_text(i).map_err(|e| {
                MurmurError::Transcription(format!("Failed to get segment {} text: {}", i, e))
            })?;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment.trim());
        }

        tracing::info!(
            segments = n_segments,
            text_len = text.len(),
            "Transcription complete"
        );

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Stub implementation (whisper feature disabled)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "whisper"))]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        _audio_data: &[f32],
        _sample_rate: u32,
    ) -> Result<String, MurmurError> {
        Err(MurmurError::Transcription(
            "Whisper transcription requires the `whisper` feature to be enabled".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Resampling helper
// ---------------------------------------------------------------------------

/// Simple linear resampling from one sample rate to another.
///
/// Linear interpolation is sufficient for Whisper input, which is already
/// low-frequency speech.
#[cfg(feature = "whisper")]
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let idx1 = (idx0 + 1).min(input.len() - 1);
        let frac = (src_idx - idx0 as f64) as f32;

        let sample = input[idx0] * (1.0 - frac) + input[idx1] * frac;
        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_service_no_model_file() {
        let config = WhisperConfig {
            model_path: "/nonexistent/model.bin".to_string(),
            language: "en".to_string(),
        };
        let result = WhisperService::new(config);
        // Without whisper feature: succeeds (stub). With: fails (no file).
        #[cfg(feature = "whisper")]
        assert!(result.is_err());
        #[cfg(not(feature = "whisper"))]
        assert!(result.is_ok());
    }

    #[cfg(not(feature = "whisper"))]
    #[tokio::test]
    async fn test_whisper_service_stub_returns_error() {
        let config = WhisperConfig::default();
        let service = WhisperService::new(config).unwrap();
        let audio = vec![0.0f32; 16_000];
        let result = service.transcribe(&audio, 16_000).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("whisper"));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_service_config_accessor() {
        let config = WhisperConfig {
            model_path: "/my/model.bin".to_string(),
            language: "auto".to_string(),
        };
        let service = WhisperService::new(config).unwrap();
        assert_eq!(service.config().model_path, "/my/model.bin");
        assert_eq!(service.config().language, "auto");
    }
}
