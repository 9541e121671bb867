//! Recording session entity.
//!
//! A session is born on a start gesture, owned exclusively by the registry
//! and its capture producer while active, and destroyed exactly once on
//! stop or cancel.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use murmur_core::types::KeyInput;

/// One in-progress or just-finished recording.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Unique identifier, assigned at creation, never reused.
    pub id: Uuid,
    /// The key that created this session.
    pub trigger_key: KeyInput,
    /// Wall-clock creation time, for logging.
    pub start_time: DateTime<Utc>,
    /// Monotonic creation instant, drives the duration floor.
    started_at: Instant,
    /// Captured samples; appended only while `active`.
    pub samples: Vec<f32>,
    /// True from creation until stop/cancel finalizes. Flips exactly once.
    pub active: bool,
    /// Floor duration configured at creation; immutable thereafter.
    pub min_duration: Duration,
}

impl RecordingSession {
    /// Create a new active session for the given trigger key.
    pub fn new(trigger_key: KeyInput, min_duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_key,
            start_time: Utc::now(),
            started_at: Instant::now(),
            samples: Vec::new(),
            active: true,
            min_duration,
        }
    }

    /// Elapsed time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time remaining until the minimum duration is met, if any.
    pub fn remaining_floor(&self) -> Option<Duration> {
        self.min_duration.checked_sub(self.elapsed()).filter(|d| !d.is_zero())
    }

    /// Append a block of captured samples.
    pub fn push_samples(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
    }
}
