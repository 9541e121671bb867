use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MurmurError, Result};
use crate::types::{KeyInput, RecordingMode};

/// Top-level configuration for the Murmur application.
///
/// Loaded from `~/.murmur/config.toml` by default. Each section corresponds
/// to one subsystem. Key and mode strings are validated with
/// [`MurmurConfig::validate`] before the core is constructed; invalid values
/// are fatal at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
}

impl MurmurConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MurmurConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MurmurError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Parse and validate every typed field, failing fast on bad input.
    pub fn validate(&self) -> Result<()> {
        self.recording.trigger_keys()?;
        self.recording.parsed_cancel_key()?;
        self.recording.parsed_mode()?;
        if self.recording.min_duration_secs < 0.0 {
            return Err(MurmurError::Config(
                "min_duration_secs must be non-negative".to_string(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(MurmurError::Config(
                "sample_rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Recording-gesture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Keys that start/stop recording (e.g. "alt_r", "f1", "caps_lock").
    pub trigger_keys: Vec<String>,
    /// Key that cancels all active recordings.
    pub cancel_key: String,
    /// Recording mode: "push_to_talk" or "toggle".
    pub mode: String,
    /// Floor duration in seconds; stops before this are deferred.
    pub min_duration_secs: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            trigger_keys: vec!["alt_r".to_string()],
            cancel_key: "escape".to_string(),
            mode: "push_to_talk".to_string(),
            min_duration_secs: 0.5,
        }
    }
}

impl RecordingConfig {
    /// Parse the configured trigger keys into typed values.
    pub fn trigger_keys(&self) -> Result<Vec<KeyInput>> {
        if self.trigger_keys.is_empty() {
            return Err(MurmurError::Config(
                "At least one trigger key must be configured".to_string(),
            ));
        }
        self.trigger_keys.iter().map(|k| k.parse()).collect()
    }

    /// Parse the configured cancel key.
    pub fn parsed_cancel_key(&self) -> Result<KeyInput> {
        self.cancel_key.parse()
    }

    /// Parse the configured recording mode.
    pub fn parsed_mode(&self) -> Result<RecordingMode> {
        self.mode.parse()
    }

    /// The minimum recording duration as a `Duration`.
    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f32(self.min_duration_secs.max(0.0))
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of capture channels.
    pub channels: u16,
    /// Preferred capture block size in samples.
    pub block_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            block_size: 1024,
        }
    }
}

/// Whisper transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Path to the GGML model file.
    pub model_path: String,
    /// Language code for transcription (e.g. "en", "auto").
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            language: "en".to_string(),
        }
    }
}
