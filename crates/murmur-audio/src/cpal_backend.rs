//! Real audio capture via cpal.
//!
//! cpal input streams are not `Send`, so each opened stream lives on its own
//! dedicated thread. The device callback forwards sample blocks through an
//! unbounded channel; dropping the [`CaptureStream`] flips a stop flag that
//! the thread polls, tearing down the device stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use murmur_core::error::{MurmurError, Result};

use crate::{CaptureBackend, CaptureEvent, CaptureStream};

/// Capture backend over the default cpal input device.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for CpalBackend {
    fn open_stream(&self, sample_rate: u32, channels: u16) -> Result<CaptureStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        // Report the outcome of stream construction back to the caller so
        // device failures surface as an open error, not a silent stream.
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("murmur-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(sample_rate, channels, tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(MurmurError::Capture(format!(
                        "Failed to start capture stream: {}",
                        e
                    ))));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                tracing::debug!(sample_rate, channels, "Capture stream active");

                while !thread_stop.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(50));
                }

                drop(stream);
                tracing::debug!("Capture stream closed");
            })
            .map_err(|e| MurmurError::Capture(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureStream::new(rx, stop)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MurmurError::Capture(
                "Capture thread exited before reporting readiness".to_string(),
            )),
        }
    }
}

fn build_input_stream(
    sample_rate: u32,
    channels: u16,
    tx: mpsc::UnboundedSender<CaptureEvent>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| MurmurError::Capture("No input device available".to_string()))?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "<unknown>".to_string());
    tracing::info!(device = %device_name, "Opening audio input device");

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let error_tx = tx.clone();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let block = if channels > 1 {
                    downmix(data, channels as usize)
                } else {
                    data.to_vec()
                };
                if !block.is_empty() {
                    let _ = tx.send(CaptureEvent::Block(block));
                }
            },
            move |err| {
                let _ = error_tx.send(CaptureEvent::Error(err.to_string()));
            },
            None,
        )
        .map_err(|e| MurmurError::Capture(format!("Failed to build input stream: {}", e)))?;

    Ok(stream)
}

/// Average interleaved frames down to mono.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
