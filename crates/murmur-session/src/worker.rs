//! Transcription queue and single worker.
//!
//! Finished recordings are handed off as jobs on an unbounded channel and
//! consumed by exactly one worker task, so transcriptions run strictly one
//! at a time in FIFO order. A failed job is logged and dropped; the worker
//! itself never dies over a bad recording.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use murmur_audio::preprocess;
use murmur_core::types::{StatusEvent, StatusSender};
use murmur_whisper::TranscriptionService;

use crate::text_inject::TextSink;

/// A finished recording waiting for transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    /// Id of the session that produced this audio.
    pub session_id: Uuid,
    /// Accumulated mono samples, unmodified since capture.
    pub samples: Vec<f32>,
    /// When the job entered the queue.
    pub queued_at: DateTime<Utc>,
}

pub type JobSender = mpsc::UnboundedSender<TranscriptionJob>;
pub type JobReceiver = mpsc::UnboundedReceiver<TranscriptionJob>;

/// Single consumer of the transcription queue.
///
/// Preprocesses each job's audio, transcribes it, and delivers non-empty
/// text to the sink. Errors on one job never affect the next.
pub struct TranscriptionWorker<T, S> {
    transcriber: Arc<T>,
    sink: Arc<S>,
    status: StatusSender,
    sample_rate: u32,
}

impl<T, S> TranscriptionWorker<T, S>
where
    T: TranscriptionService,
    S: TextSink,
{
    pub fn new(transcriber: Arc<T>, sink: Arc<S>, status: StatusSender, sample_rate: u32) -> Self {
        Self {
            transcriber,
            sink,
            status,
            sample_rate,
        }
    }

    /// Run until the job channel closes or shutdown is signalled.
    ///
    /// Jobs already dequeued are finished before the worker exits; jobs
    /// still queued at shutdown are dropped with the channel.
    pub async fn run(self, mut jobs: JobReceiver, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Transcription worker started");

        loop {
            tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => self.process(job).await,
                    None => {
                        tracing::debug!("Job channel closed; worker exiting");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    // A dropped sender means the rest of the pipeline is
                    // gone; treat it the same as an explicit shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown signalled; worker exiting");
                        break;
                    }
                }
            }
        }
    }

    async fn process(&self, job: TranscriptionJob) {
        let queue_delay_ms = (Utc::now() - job.queued_at).num_milliseconds();
        tracing::debug!(
            session_id = %job.session_id,
            samples = job.samples.len(),
            queue_delay_ms,
            "Processing transcription job"
        );

        let mut samples = job.samples;
        preprocess(&mut samples, self.sample_rate);

        match self.transcriber.transcribe(&samples, self.sample_rate).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::info!(session_id = %job.session_id, "No speech detected");
                    let _ = self.status.send(StatusEvent::NoSpeech);
                    return;
                }

                tracing::info!(
                    session_id = %job.session_id,
                    text_len = text.len(),
                    "Transcribed"
                );
                if let Err(e) = self.sink.type_text(text) {
                    tracing::warn!(
                        session_id = %job.session_id,
                        error = %e,
                        "Failed to type transcribed text"
                    );
                }
                let _ = self.status.send(StatusEvent::Transcribed(text.to_string()));
            }
            Err(e) => {
                tracing::error!(
                    session_id = %job.session_id,
                    error = %e,
                    "Transcription failed"
                );
                let _ = self.status.send(StatusEvent::Error(e.to_string()));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
