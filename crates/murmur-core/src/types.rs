//! Shared types for the Murmur recording pipeline.
//!
//! Keys are modeled as a tagged variant rather than by structural probing:
//! a key either carries a character or is one of a fixed set of named keys,
//! and two keys are equal only if their tags and payloads match.

use std::fmt;
use std::str::FromStr;

use crate::error::MurmurError;

// =============================================================================
// Key identity
// =============================================================================

/// A non-character key with a stable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NamedKey {
    AltLeft,
    AltRight,
    CapsLock,
    ControlLeft,
    ControlRight,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    MetaLeft,
    MetaRight,
    ShiftLeft,
    ShiftRight,
    Space,
    Tab,
}

/// Identity of a key delivered by the key-event source.
///
/// Compared by identity, never by probing: a character key and a named key
/// are never equal, and distinct trigger keys drive distinct sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyInput {
    /// A key that produces a character (e.g. `r`).
    Character(char),
    /// A special key identified by name (e.g. right Alt, F1).
    Named(NamedKey),
}

impl fmt::Display for KeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyInput::Character(c) => write!(f, "{}", c),
            KeyInput::Named(key) => write!(f, "{:?}", key),
        }
    }
}

impl FromStr for KeyInput {
    type Err = MurmurError;

    /// Parse a configuration key string such as `"alt_r"`, `"f1"` or `"x"`.
    ///
    /// Single-character strings become `Character` keys; everything else
    /// must match a known named key. Unknown names are a configuration
    /// error, fatal at startup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();

        let named = match normalized.as_str() {
            "alt" | "alt_l" => Some(NamedKey::AltLeft),
            "alt_r" | "alt_gr" => Some(NamedKey::AltRight),
            "caps_lock" => Some(NamedKey::CapsLock),
            "ctrl" | "ctrl_l" => Some(NamedKey::ControlLeft),
            "ctrl_r" => Some(NamedKey::ControlRight),
            "esc" | "escape" => Some(NamedKey::Escape),
            "f1" => Some(NamedKey::F1),
            "f2" => Some(NamedKey::F2),
            "f3" => Some(NamedKey::F3),
            "f4" => Some(NamedKey::F4),
            "f5" => Some(NamedKey::F5),
            "f6" => Some(NamedKey::F6),
            "f7" => Some(NamedKey::F7),
            "f8" => Some(NamedKey::F8),
            "f9" => Some(NamedKey::F9),
            "f10" => Some(NamedKey::F10),
            "f11" => Some(NamedKey::F11),
            "f12" => Some(NamedKey::F12),
            "cmd" | "cmd_l" | "meta" | "super" => Some(NamedKey::MetaLeft),
            "cmd_r" | "meta_r" => Some(NamedKey::MetaRight),
            "shift" | "shift_l" => Some(NamedKey::ShiftLeft),
            "shift_r" => Some(NamedKey::ShiftRight),
            "space" => Some(NamedKey::Space),
            "tab" => Some(NamedKey::Tab),
            _ => None,
        };

        if let Some(key) = named {
            return Ok(KeyInput::Named(key));
        }

        let mut chars = normalized.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(KeyInput::Character(c)),
            _ => Err(MurmurError::Config(format!("Unknown key: '{}'", s))),
        }
    }
}

// =============================================================================
// Recording mode
// =============================================================================

/// How trigger-key presses and releases map to session boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    /// Hold the trigger to record; release to stop and transcribe.
    PushToTalk,
    /// Press once to start, press again to stop; releases are ignored.
    Toggle,
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingMode::PushToTalk => write!(f, "push_to_talk"),
            RecordingMode::Toggle => write!(f, "toggle"),
        }
    }
}

impl FromStr for RecordingMode {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push_to_talk" | "ptt" => Ok(RecordingMode::PushToTalk),
            "toggle" => Ok(RecordingMode::Toggle),
            other => Err(MurmurError::Config(format!(
                "Unknown recording mode: '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Status events
// =============================================================================

/// User-visible status transitions emitted by the pipeline.
///
/// Terminal outcomes (`Transcribed`, `NoSpeech`, `Cancelled`, `Error`) are
/// transient; the display returns to `Ready` shortly after each one.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Idle, waiting for a trigger.
    Ready,
    /// A session is capturing audio.
    Recording,
    /// A job is queued or being transcribed.
    Processing,
    /// Transcription finished with text that was handed to the sink.
    Transcribed(String),
    /// The stop produced no speech (empty audio or empty transcription).
    NoSpeech,
    /// The session was cancelled and its audio discarded.
    Cancelled,
    /// A transient, per-job error (never fatal to the pipeline).
    Error(String),
}

/// Sender half of the best-effort status channel.
///
/// Status delivery must never block or fail the pipeline; senders ignore
/// the error when the receiver has gone away.
pub type StatusSender = tokio::sync::mpsc::UnboundedSender<StatusEvent>;

/// Receiver half of the status channel.
pub type StatusReceiver = tokio::sync::mpsc::UnboundedReceiver<StatusEvent>;

// =============================================================================
// Tests
// =============================================================================
