//! Key gesture interpretation.
//!
//! Translates raw press/release events into registry calls under one of two
//! modes: push-to-talk (hold to record) or toggle (tap to start, tap to
//! stop). The cancel key discards all active recordings in either mode.

use std::collections::HashSet;
use std::sync::Mutex;

use murmur_core::types::{KeyInput, RecordingMode};

use crate::registry::SessionRegistry;

/// Interprets key gestures and drives the session registry.
///
/// Tracks which trigger keys are currently engaged so key-repeat presses
/// (push-to-talk) and double-taps (toggle) resolve deterministically.
pub struct GestureHandler {
    registry: SessionRegistry,
    mode: RecordingMode,
    trigger_keys: HashSet<KeyInput>,
    cancel_key: KeyInput,
    engaged: Mutex<HashSet<KeyInput>>,
}

impl GestureHandler {
    pub fn new(
        registry: SessionRegistry,
        mode: RecordingMode,
        trigger_keys: Vec<KeyInput>,
        cancel_key: KeyInput,
    ) -> Self {
        Self {
            registry,
            mode,
            trigger_keys: trigger_keys.into_iter().collect(),
            cancel_key,
            engaged: Mutex::new(HashSet::new()),
        }
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    /// Handle a key press.
    pub fn on_press(&self, key: KeyInput) {
        if key == self.cancel_key {
            let had_engaged = {
                let mut engaged = self.engaged.lock().expect("gesture mutex poisoned");
                let had = !engaged.is_empty();
                engaged.clear();
                had
            };
            if had_engaged {
                tracing::info!("Cancel key pressed; discarding all recordings");
                self.registry.cancel_all();
            }
            return;
        }

        if !self.trigger_keys.contains(&key) {
            return;
        }

        match self.mode {
            RecordingMode::PushToTalk => {
                // OS key repeat fires on_press again while held; only the
                // first press for a key starts a session.
                let fresh = self
                    .engaged
                    .lock()
                    .expect("gesture mutex poisoned")
                    .insert(key);
                if fresh {
                    self.registry.begin(key);
                }
            }
            RecordingMode::Toggle => {
                let was_latched = self
                    .engaged
                    .lock()
                    .expect("gesture mutex poisoned")
                    .remove(&key);
                if was_latched {
                    self.registry.stop(key);
                } else if self.registry.begin(key).is_some() {
                    // Latch only on a real start. A press that lands while
                    // the previous session's stop is still deferred finds
                    // the key occupied and is ignored.
                    self.engaged
                        .lock()
                        .expect("gesture mutex poisoned")
                        .insert(key);
                }
            }
        }
    }

    /// Handle a key release. Only meaningful in push-to-talk mode.
    pub fn on_release(&self, key: KeyInput) {
        if self.mode != RecordingMode::PushToTalk {
            return;
        }

        let was_engaged = self
            .engaged
            .lock()
            .expect("gesture mutex poisoned")
            .remove(&key);
        if was_engaged {
            self.registry.stop(key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::TranscriptionJob;
    use murmur_audio::MockCaptureBackend;
    use murmur_core::types::{NamedKey, StatusEvent};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const TRIGGER: KeyInput = KeyInput::Named(NamedKey::AltRight);
    const OTHER: KeyInput = KeyInput::Named(NamedKey::F1);
    const CANCEL: KeyInput = KeyInput::Named(NamedKey::Escape);

    fn handler(
        mode: RecordingMode,
    ) -> (
        GestureHandler,
        SessionRegistry,
        mpsc::UnboundedReceiver<TranscriptionJob>,
        mpsc::UnboundedReceiver<StatusEvent>,
    ) {
        handler_with_floor(mode, Duration::ZERO)
    }

    fn handler_with_floor(
        mode: RecordingMode,
        min_duration: Duration,
    ) -> (
        GestureHandler,
        SessionRegistry,
        mpsc::UnboundedReceiver<TranscriptionJob>,
        mpsc::UnboundedReceiver<StatusEvent>,
    ) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let registry = SessionRegistry::new(
            Arc::new(MockCaptureBackend::new()),
            jobs_tx,
            status_tx,
            16_000,
            1,
            min_duration,
        );
        let handler = GestureHandler::new(
            registry.clone(),
            mode,
            vec![TRIGGER, OTHER],
            CANCEL,
        );
        (handler, registry, jobs_rx, status_rx)
    }

    #[tokio::test]
    async fn test_ptt_press_starts_release_stops() {
        let (handler, registry, mut jobs, _status) = handler(RecordingMode::PushToTalk);

        handler.on_press(TRIGGER);
        assert_eq!(registry.active_count(), 1);

        for id in registry.active_sessions() {
            registry.append(id, &[0.1; 32]);
        }

        handler.on_release(TRIGGER);
        assert_eq!(registry.active_count(), 0);

        let job = timeout(Duration::from_secs(1), jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.samples.len(), 32);
    }

    #[tokio::test]
    async fn test_ptt_key_repeat_is_ignored() {
        let (handler, registry, _jobs, _status) = handler(RecordingMode::PushToTalk);

        handler.on_press(TRIGGER);
        handler.on_press(TRIGGER);
        handler.on_press(TRIGGER);
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_ptt_release_without_press_is_noop() {
        let (handler, registry, _jobs, _status) = handler(RecordingMode::PushToTalk);
        handler.on_release(TRIGGER);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_toggle_tap_starts_tap_stops() {
        let (handler, registry, mut jobs, _status) = handler(RecordingMode::Toggle);

        handler.on_press(TRIGGER);
        handler.on_release(TRIGGER);
        assert_eq!(registry.active_count(), 1);

        for id in registry.active_sessions() {
            registry.append(id, &[0.2; 16]);
        }

        handler.on_press(TRIGGER);
        handler.on_release(TRIGGER);
        assert_eq!(registry.active_count(), 0);

        let job = timeout(Duration::from_secs(1), jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.samples.len(), 16);
    }

    #[tokio::test]
    async fn test_toggle_third_press_starts_independent_session() {
        let (handler, registry, mut jobs, _status) = handler(RecordingMode::Toggle);

        handler.on_press(TRIGGER);
        let first = registry.active_sessions()[0];
        registry.append(first, &[0.1; 8]);

        handler.on_press(TRIGGER);
        let job = timeout(Duration::from_secs(1), jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.session_id, first);

        // Third press: a fresh session with a new id, independent of the
        // finished one.
        handler.on_press(TRIGGER);
        let sessions = registry.active_sessions();
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0], first);
    }

    #[tokio::test]
    async fn test_toggle_press_during_deferred_stop_is_ignored() {
        let (handler, registry, mut jobs, _status) =
            handler_with_floor(RecordingMode::Toggle, Duration::from_millis(200));

        handler.on_press(TRIGGER);
        let first = registry.active_sessions()[0];
        registry.append(first, &[0.2; 8]);

        // Second press stops; the floor defers finalization.
        handler.on_press(TRIGGER);
        assert!(registry.is_active(first));

        // Third press while the deferral is pending: the key is still owned
        // by the stopping session, so nothing starts and the latch stays
        // clear.
        handler.on_press(TRIGGER);
        assert_eq!(registry.active_sessions(), vec![first]);

        let job = timeout(Duration::from_secs(1), jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.session_id, first);

        // Once the stop has resolved, the next press starts fresh.
        handler.on_press(TRIGGER);
        let sessions = registry.active_sessions();
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0], first);
    }

    #[tokio::test]
    async fn test_cancel_discards_and_resets_toggle_latch() {
        let (handler, registry, mut jobs, _status) = handler(RecordingMode::Toggle);

        handler.on_press(TRIGGER);
        assert_eq!(registry.active_count(), 1);

        handler.on_press(CANCEL);
        assert_eq!(registry.active_count(), 0);

        // Latch was reset: the next tap starts a new recording rather than
        // trying to stop the cancelled one.
        handler.on_press(TRIGGER);
        assert_eq!(registry.active_count(), 1);

        assert!(
            timeout(Duration::from_millis(100), jobs.recv()).await.is_err(),
            "cancel must not enqueue a job"
        );
    }

    #[tokio::test]
    async fn test_cancel_with_nothing_active_is_noop() {
        let (handler, registry, _jobs, mut status) = handler(RecordingMode::PushToTalk);
        handler.on_press(CANCEL);
        assert_eq!(registry.active_count(), 0);
        assert!(status.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ptt_cancel_clears_all_engaged_keys() {
        let (handler, registry, _jobs, _status) = handler(RecordingMode::PushToTalk);

        handler.on_press(TRIGGER);
        handler.on_press(OTHER);
        assert_eq!(registry.active_count(), 2);

        handler.on_press(CANCEL);
        assert_eq!(registry.active_count(), 0);

        // Releases after the cancel are no-ops.
        handler.on_release(TRIGGER);
        handler.on_release(OTHER);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_key_is_ignored() {
        let (handler, registry, _jobs, _status) = handler(RecordingMode::PushToTalk);
        handler.on_press(KeyInput::Character('q'));
        handler.on_release(KeyInput::Character('q'));
        assert_eq!(registry.active_count(), 0);
    }
}
