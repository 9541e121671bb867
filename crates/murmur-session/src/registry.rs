//! Thread-safe store of active recording sessions.
//!
//! The registry is the single point of mutual exclusion for the pipeline:
//! gesture handlers begin/stop/cancel sessions, capture producers append
//! sample blocks, and deferred stop tasks re-enter finalization — all under
//! one short-held lock. The slow transcription call never runs under it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use murmur_audio::{CaptureBackend, CaptureEvent};
use murmur_core::types::{KeyInput, StatusEvent, StatusSender};

use crate::session::RecordingSession;
use crate::worker::{JobSender, TranscriptionJob};

/// Result of appending a capture block to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The block was appended to an active session.
    Appended,
    /// The session has already stopped; the block was dropped silently.
    SessionClosed,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<Uuid, RecordingSession>,
    by_key: HashMap<KeyInput, Uuid>,
}

/// Thread-safe registry of active sessions, keyed by id and trigger key.
///
/// Enforces at-most-one-active-session-per-key. Cloning yields another
/// handle to the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    state: Arc<Mutex<RegistryState>>,
    backend: Arc<dyn CaptureBackend>,
    jobs: JobSender,
    status: StatusSender,
    sample_rate: u32,
    channels: u16,
    min_duration: Duration,
}

impl SessionRegistry {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        jobs: JobSender,
        status: StatusSender,
        sample_rate: u32,
        channels: u16,
        min_duration: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            backend,
            jobs,
            status,
            sample_rate,
            channels,
            min_duration,
        }
    }

    /// Create and register a new active session for `key`.
    ///
    /// Returns `None` if an active session already exists for the key.
    /// Starts a capture producer bound to the new session.
    pub fn begin(&self, key: KeyInput) -> Option<Uuid> {
        let (session_id, start_time) = {
            let mut state = self.state.lock().expect("registry mutex poisoned");
            if state.by_key.contains_key(&key) {
                tracing::debug!(key = %key, "Recording already active for key; ignoring start");
                return None;
            }

            let session = RecordingSession::new(key, self.min_duration);
            let session_id = session.id;
            let start_time = session.start_time;
            state.by_key.insert(key, session_id);
            state.sessions.insert(session_id, session);
            (session_id, start_time)
        };

        tracing::info!(
            session_id = %session_id,
            key = %key,
            start_time = %start_time,
            "Recording started"
        );
        let _ = self.status.send(StatusEvent::Recording);
        self.spawn_capture_producer(session_id);
        Some(session_id)
    }

    /// Initiate the stop sequence for every active session on `key`.
    ///
    /// Idempotent: stopping a key with no active session is a no-op.
    pub fn stop(&self, key: KeyInput) {
        let ids: Vec<Uuid> = {
            let state = self.state.lock().expect("registry mutex poisoned");
            state
                .sessions
                .values()
                .filter(|s| s.trigger_key == key && s.active)
                .map(|s| s.id)
                .collect()
        };

        for id in ids {
            self.finalize(id);
        }
    }

    /// Discard every active session on `key` immediately, producing no job.
    ///
    /// Bypasses the minimum-duration floor entirely.
    pub fn cancel(&self, key: KeyInput) {
        let ids: Vec<Uuid> = {
            let state = self.state.lock().expect("registry mutex poisoned");
            state
                .sessions
                .values()
                .filter(|s| s.trigger_key == key)
                .map(|s| s.id)
                .collect()
        };

        let mut cancelled = false;
        for id in ids {
            cancelled |= self.discard(id);
        }
        if cancelled {
            let _ = self.status.send(StatusEvent::Cancelled);
        }
    }

    /// Cancel every active session across all keys.
    pub fn cancel_all(&self) {
        let ids: Vec<Uuid> = {
            let state = self.state.lock().expect("registry mutex poisoned");
            state.sessions.keys().copied().collect()
        };

        let mut cancelled = false;
        for id in ids {
            cancelled |= self.discard(id);
        }
        if cancelled {
            let _ = self.status.send(StatusEvent::Cancelled);
        }
    }

    /// Append a block of captured samples to the named session.
    ///
    /// Silently drops the block if the session has already stopped (benign
    /// race between the capture producer and stop finalization).
    pub fn append(&self, session_id: Uuid, block: &[f32]) -> AppendOutcome {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        match state.sessions.get_mut(&session_id) {
            Some(session) if session.active => {
                session.push_samples(block);
                AppendOutcome::Appended
            }
            _ => AppendOutcome::SessionClosed,
        }
    }

    /// Whether the named session is still registered and active.
    pub fn is_active(&self, session_id: Uuid) -> bool {
        let state = self.state.lock().expect("registry mutex poisoned");
        state
            .sessions
            .get(&session_id)
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// Number of active sessions across all keys.
    pub fn active_count(&self) -> usize {
        self.state
            .lock()
            .expect("registry mutex poisoned")
            .sessions
            .len()
    }

    /// Ids of all active sessions.
    pub fn active_sessions(&self) -> Vec<Uuid> {
        self.state
            .lock()
            .expect("registry mutex poisoned")
            .sessions
            .keys()
            .copied()
            .collect()
    }

    /// Finalize a stop for the named session, deferring if the minimum
    /// duration has not yet elapsed.
    ///
    /// The deferred task re-enters this method and re-reads the registry,
    /// so a cancel that lands while the deferral sleeps wins: the session
    /// is gone by the time the task fires and no job is created.
    fn finalize(&self, session_id: Uuid) {
        let mut state = self.state.lock().expect("registry mutex poisoned");

        let remaining = match state.sessions.get(&session_id) {
            Some(session) => session.remaining_floor(),
            // Already finalized or cancelled; deferred stops land here.
            None => return,
        };

        if let Some(remaining) = remaining {
            tracing::debug!(
                session_id = %session_id,
                remaining_ms = remaining.as_millis() as u64,
                "Extending recording to meet minimum duration"
            );
            drop(state);

            let registry = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(remaining).await;
                registry.finalize(session_id);
            });
            return;
        }

        // Past the floor: removal and the enqueue/drop decision happen as
        // one atomic step under the lock, so a concurrent begin for the
        // same key afterward sees no active session.
        let Some(mut session) = state.sessions.remove(&session_id) else {
            return;
        };
        state.by_key.remove(&session.trigger_key);
        session.active = false;

        let duration_secs = session.elapsed().as_secs_f64();
        let sample_count = session.samples.len();

        if sample_count > 0 {
            let job = TranscriptionJob {
                session_id,
                samples: std::mem::take(&mut session.samples),
                queued_at: Utc::now(),
            };
            let _ = self.jobs.send(job);
            drop(state);

            tracing::info!(
                session_id = %session_id,
                duration_secs,
                samples = sample_count,
                "Recording stopped; queued for transcription"
            );
            let _ = self.status.send(StatusEvent::Processing);
        } else {
            drop(state);

            tracing::warn!(
                session_id = %session_id,
                duration_secs,
                "No audio data recorded, skipping"
            );
            let _ = self.status.send(StatusEvent::NoSpeech);
        }
    }

    /// Remove a session without producing a job. Returns whether a session
    /// was actually removed.
    fn discard(&self, session_id: Uuid) -> bool {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let Some(mut session) = state.sessions.remove(&session_id) else {
            return false;
        };
        state.by_key.remove(&session.trigger_key);
        session.active = false;
        drop(state);

        tracing::info!(
            session_id = %session_id,
            duration_secs = session.elapsed().as_secs_f64(),
            samples = session.samples.len(),
            "Recording cancelled"
        );
        true
    }

    /// Spawn the capture producer bound to a new session.
    ///
    /// The producer opens a device stream and appends blocks until the
    /// session stops. Capture errors degrade to a best-effort normal stop
    /// with whatever samples were gathered.
    fn spawn_capture_producer(&self, session_id: Uuid) {
        let registry = self.clone();
        let backend = Arc::clone(&self.backend);
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        tokio::spawn(async move {
            let opened = tokio::task::spawn_blocking(move || {
                backend.open_stream(sample_rate, channels)
            })
            .await;

            let mut stream = match opened {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    tracing::error!(session_id = %session_id, error = %e, "Audio stream failed to activate");
                    registry.finalize(session_id);
                    return;
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Capture task panicked");
                    registry.finalize(session_id);
                    return;
                }
            };

            tracing::debug!(session_id = %session_id, "Audio stream is active");
            let mut poll = tokio::time::interval(Duration::from_millis(100));

            loop {
                tokio::select! {
                    event = stream.next_event() => match event {
                        Some(CaptureEvent::Block(block)) => {
                            if registry.append(session_id, &block) == AppendOutcome::SessionClosed {
                                break;
                            }
                        }
                        Some(CaptureEvent::Error(e)) => {
                            tracing::warn!(
                                session_id = %session_id,
                                error = %e,
                                "Capture error; finalizing with captured audio"
                            );
                            registry.finalize(session_id);
                            break;
                        }
                        None => {
                            tracing::debug!(session_id = %session_id, "Capture stream ended");
                            registry.finalize(session_id);
                            break;
                        }
                    },
                    _ = poll.tick() => {
                        if !registry.is_active(session_id) {
                            break;
                        }
                    }
                }
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_audio::MockCaptureBackend;
    use murmur_core::types::NamedKey;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const KEY: KeyInput = KeyInput::Named(NamedKey::AltRight);
    const OTHER_KEY: KeyInput = KeyInput::Named(NamedKey::F1);

    struct Harness {
        registry: SessionRegistry,
        jobs: mpsc::UnboundedReceiver<TranscriptionJob>,
        status: mpsc::UnboundedReceiver<StatusEvent>,
    }

    fn harness(min_duration: Duration) -> Harness {
        harness_with_backend(min_duration, Arc::new(MockCaptureBackend::new()))
    }

    fn harness_with_backend(
        min_duration: Duration,
        backend: Arc<dyn CaptureBackend>,
    ) -> Harness {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let registry =
            SessionRegistry::new(backend, jobs_tx, status_tx, 16_000, 1, min_duration);
        Harness {
            registry,
            jobs: jobs_rx,
            status: status_rx,
        }
    }

    async fn expect_no_job(jobs: &mut mpsc::UnboundedReceiver<TranscriptionJob>, wait: Duration) {
        assert!(
            timeout(wait, jobs.recv()).await.is_err(),
            "unexpected job enqueued"
        );
    }

    #[tokio::test]
    async fn test_begin_is_mutually_exclusive_per_key() {
        let h = harness(Duration::ZERO);
        let first = h.registry.begin(KEY);
        let second = h.registry.begin(KEY);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(h.registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_record_simultaneously() {
        let h = harness(Duration::ZERO);
        let a = h.registry.begin(KEY).unwrap();
        let b = h.registry.begin(OTHER_KEY).unwrap();

        assert_ne!(a, b);
        assert_eq!(h.registry.active_count(), 2);
    }

    #[tokio::test]
    async fn test_stop_with_samples_enqueues_one_job() {
        let mut h = harness(Duration::ZERO);
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.1, 0.2, 0.3]);
        h.registry.stop(KEY);

        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.session_id, id);
        assert_eq!(job.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(h.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut h = harness(Duration::ZERO);
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.5; 100]);
        h.registry.stop(KEY);

        let _ = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();

        // Stopping again produces no duplicate job and no error.
        h.registry.stop(KEY);
        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_stop_unknown_key_is_noop() {
        let mut h = harness(Duration::ZERO);
        h.registry.stop(KEY);
        h.registry.cancel(KEY);
        expect_no_job(&mut h.jobs, Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_no_audio_no_job() {
        let mut h = harness(Duration::ZERO);
        h.registry.begin(KEY).unwrap();
        h.registry.stop(KEY);

        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;

        // Drain status events and confirm the no-audio outcome was signaled.
        let mut saw_no_speech = false;
        while let Ok(event) = h.status.try_recv() {
            if event == StatusEvent::NoSpeech {
                saw_no_speech = true;
            }
        }
        assert!(saw_no_speech);
    }

    #[tokio::test]
    async fn test_minimum_duration_defers_finalization() {
        let mut h = harness(Duration::from_millis(300));
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.1; 64]);

        // Stop well before the floor; finalization must not happen yet.
        h.registry.stop(KEY);
        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;
        assert!(h.registry.is_active(id));

        // Exactly one job arrives once the floor has elapsed.
        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.session_id, id);
        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_session_keeps_capturing_during_deferral() {
        let mut h = harness(Duration::from_millis(200));
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.1; 10]);
        h.registry.stop(KEY);

        // Appends during the deferral window still land in the session.
        assert_eq!(h.registry.append(id, &[0.2; 10]), AppendOutcome::Appended);

        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.samples.len(), 20);
    }

    #[tokio::test]
    async fn test_cancel_supersedes_duration_floor() {
        let mut h = harness(Duration::from_millis(200));
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.9; 256]);

        h.registry.stop(KEY);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Cancel while the deferred finalization is still pending.
        h.registry.cancel(KEY);
        assert_eq!(h.registry.active_count(), 0);

        // The deferred task fires, observes the cancellation, and creates
        // no job.
        expect_no_job(&mut h.jobs, Duration::from_millis(400)).await;
    }

    #[tokio::test]
    async fn test_cancel_is_immediate_and_produces_no_job() {
        let mut h = harness(Duration::from_secs(10));
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.9; 256]);

        h.registry.cancel(KEY);
        assert_eq!(h.registry.active_count(), 0);
        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;

        // The key is immediately available for a fresh session.
        let next = h.registry.begin(KEY).unwrap();
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn test_cancel_all_clears_every_key() {
        let h = harness(Duration::ZERO);
        h.registry.begin(KEY).unwrap();
        h.registry.begin(OTHER_KEY).unwrap();
        assert_eq!(h.registry.active_count(), 2);

        h.registry.cancel_all();
        assert_eq!(h.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_append_after_stop_is_dropped() {
        let mut h = harness(Duration::ZERO);
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.1; 8]);
        h.registry.stop(KEY);

        let _ = timeout(Duration::from_secs(1), h.jobs.recv()).await.unwrap();
        assert_eq!(h.registry.append(id, &[0.2; 8]), AppendOutcome::SessionClosed);
    }

    #[tokio::test]
    async fn test_capture_open_failure_finalizes_session() {
        let h = harness_with_backend(
            Duration::ZERO,
            Arc::new(MockCaptureBackend::failing()),
        );
        h.registry.begin(KEY).unwrap();

        // The producer fails to open the device and finalizes the session
        // best-effort (zero samples, so no job).
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_capture_producer_appends_blocks() {
        let backend = Arc::new(MockCaptureBackend::with_blocks(vec![
            vec![0.1; 100],
            vec![0.2; 100],
        ]));
        let mut h = harness_with_backend(Duration::ZERO, Arc::clone(&backend) as _);

        h.registry.begin(KEY).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.opened_streams(), 1);

        h.registry.stop(KEY);
        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.samples.len(), 200);
    }

    #[tokio::test]
    async fn test_capture_error_degrades_to_normal_stop() {
        let backend = Arc::new(MockCaptureBackend::with_blocks(vec![vec![0.3; 50]]));
        let mut h = harness_with_backend(Duration::ZERO, Arc::clone(&backend) as _);

        h.registry.begin(KEY).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        backend.emit_error("device dropped");

        // Finalized with whatever samples were gathered.
        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.samples.len(), 50);
        assert_eq!(h.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_scenario_short_release_with_floor() {
        // Press at t=0, release at ~t=0, floor 300 ms: finalize does not
        // happen before the floor, then exactly one job.
        let mut h = harness(Duration::from_millis(300));
        let id = h.registry.begin(KEY).unwrap();
        h.registry.append(id, &[0.1; 512]);
        h.registry.stop(KEY);

        expect_no_job(&mut h.jobs, Duration::from_millis(150)).await;

        let job = timeout(Duration::from_secs(1), h.jobs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.session_id, id);
        expect_no_job(&mut h.jobs, Duration::from_millis(100)).await;
    }
}
