//! CLI argument definitions for the Murmur application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use murmur_core::config::MurmurConfig;

/// Murmur — push-to-talk speech transcription that types into the focused app.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the Whisper GGML model file.
    #[arg(short = 'm', long = "model-path")]
    pub model_path: Option<String>,

    /// Minimum recording duration in seconds.
    #[arg(long = "min-duration")]
    pub min_duration: Option<f32>,

    /// Recording mode: push_to_talk or toggle.
    #[arg(long = "mode")]
    pub mode: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MURMUR_CONFIG env var > platform default
    /// (~/.murmur/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MURMUR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Overlay CLI flags onto a loaded configuration.
    pub fn apply_to(&self, config: &mut MurmurConfig) {
        if let Some(ref model_path) = self.model_path {
            config.whisper.model_path = model_path.clone();
        }
        if let Some(min_duration) = self.min_duration {
            config.recording.min_duration_secs = min_duration;
        }
        if let Some(ref mode) = self.mode {
            config.recording.mode = mode.clone();
        }
        if let Some(ref log_level) = self.log_level {
            config.general.log_level = log_level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".murmur").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".murmur").join("config.toml");
    }
    PathBuf::from("config.toml")
}
