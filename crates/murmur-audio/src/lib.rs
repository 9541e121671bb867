//! Murmur Audio crate - capture backend abstraction and audio preprocessing.
//!
//! Provides a trait-based abstraction over audio capture devices. The real
//! implementation wraps a cpal input stream on a dedicated thread; a mock
//! implementation allows testing the session pipeline without hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use murmur_core::error::{MurmurError, Result};

pub mod cpal_backend;
pub mod preprocess;

pub use cpal_backend::CpalBackend;
pub use preprocess::preprocess;

// =============================================================================
// Capture stream
// =============================================================================

/// One delivery from an open capture stream.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A block of captured PCM samples as f32 values in [-1.0, 1.0].
    Block(Vec<f32>),
    /// A backend-level error (e.g. device dropped mid-stream). The stream
    /// may produce no further blocks after this.
    Error(String),
}

/// An open capture stream delivering sample blocks until dropped.
///
/// Dropping the stream signals the backend to stop capturing and release
/// the device.
pub struct CaptureStream {
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    stop: Arc<AtomicBool>,
}

impl CaptureStream {
    pub fn new(events: mpsc::UnboundedReceiver<CaptureEvent>, stop: Arc<AtomicBool>) -> Self {
        Self { events, stop }
    }

    /// Receive the next capture event.
    ///
    /// Returns `None` when the backend has closed the stream.
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        self.events.recv().await
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// =============================================================================
// Backend trait
// =============================================================================

/// Source of audio capture streams.
///
/// Implementations open a device stream that delivers sample blocks via
/// [`CaptureEvent`]s. Backend errors are reported as events or as an
/// `open_stream` error, never as panics.
pub trait CaptureBackend: Send + Sync {
    /// Open a capture stream at the requested format.
    fn open_stream(&self, sample_rate: u32, channels: u16) -> Result<CaptureStream>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock capture backend for testing.
///
/// Delivers a fixed set of sample blocks to every opened stream, then keeps
/// the stream open until it is dropped. Streams opened from a backend built
/// with [`MockCaptureBackend::failing`] report an open error instead.
pub struct MockCaptureBackend {
    blocks: Vec<Vec<f32>>,
    fail_open: bool,
    opened: AtomicUsize,
    // Keeps the sender side of every opened stream alive so the channel
    // only closes when the backend itself is dropped.
    senders: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
}

impl Default for MockCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureBackend {
    /// A backend that opens silent streams (no blocks delivered).
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            fail_open: false,
            opened: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// A backend that delivers the given blocks to every opened stream.
    pub fn with_blocks(blocks: Vec<Vec<f32>>) -> Self {
        Self {
            blocks,
            ..Self::new()
        }
    }

    /// A backend whose `open_stream` always fails.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    /// Number of streams opened so far.
    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    /// Push an error event into every open stream.
    pub fn emit_error(&self, message: &str) {
        let senders = self.senders.lock().expect("sender mutex poisoned");
        for tx in senders.iter() {
            let _ = tx.send(CaptureEvent::Error(message.to_string()));
        }
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn open_stream(&self, _sample_rate: u32, _channels: u16) -> Result<CaptureStream> {
        if self.fail_open {
            return Err(MurmurError::Capture(
                "Mock capture device unavailable".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for block in &self.blocks {
            let _ = tx.send(CaptureEvent::Block(block.clone()));
        }

        self.senders
            .lock()
            .expect("sender mutex poisoned")
            .push(tx);
        self.opened.fetch_add(1, Ordering::Relaxed);

        Ok(CaptureStream::new(rx, Arc::new(AtomicBool::new(false))))
    }
}

// =============================================================================
// Tests
// =============================================================================
