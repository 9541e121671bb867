//! Murmur application binary - composition root.
//!
//! Ties together all Murmur crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the session registry over the cpal capture backend
//! 3. Start the single transcription worker (Whisper -> text injection)
//! 4. Start the global key listener and feed gestures to the registry
//! 5. Run until Ctrl+C, cancelling any in-flight recording on the way out

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, watch};

use murmur_audio::CpalBackend;
use murmur_core::config::MurmurConfig;
use murmur_core::types::KeyInput;
use murmur_session::{GestureHandler, SendInputInjector, SessionRegistry, TranscriptionWorker};
use murmur_whisper::WhisperService;

mod cli;
mod keys;
mod status;

use cli::CliArgs;

/// A mapped press or release from the global key listener.
#[derive(Debug, Clone, Copy)]
enum KeyEvent {
    Press(KeyInput),
    Release(KeyInput),
}

/// Run the rdev global listener on its own thread, forwarding mapped key
/// events into the async dispatch loop.
///
/// `rdev::listen` blocks its thread for the process lifetime and its
/// callback runs on OS hook context, so it only maps and forwards.
fn spawn_key_listener(events: mpsc::UnboundedSender<KeyEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("murmur-keys".to_string())
        .spawn(move || {
            let result = rdev::listen(move |event: rdev::Event| match event.event_type {
                rdev::EventType::KeyPress(key) => {
                    if let Some(key) = keys::map_key(key) {
                        let _ = events.send(KeyEvent::Press(key));
                    }
                }
                rdev::EventType::KeyRelease(key) => {
                    if let Some(key) = keys::map_key(key) {
                        let _ = events.send(KeyEvent::Release(key));
                    }
                }
                _ => {}
            });
            if let Err(e) = result {
                tracing::error!(error = ?e, "Global key listener failed");
            }
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = MurmurConfig::load_or_default(&config_file);
    args.apply_to(&mut config);
    config.validate()?;

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.general.log_level.clone())
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Murmur v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let trigger_keys = config.recording.trigger_keys()?;
    let cancel_key = config.recording.parsed_cancel_key()?;
    let mode = config.recording.parsed_mode()?;
    tracing::info!(
        mode = %mode,
        triggers = ?config.recording.trigger_keys,
        cancel = %cancel_key,
        min_duration_secs = config.recording.min_duration_secs,
        "Recording gestures configured"
    );

    // Channels: finished recordings, status display, shutdown.
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Session registry over the cpal capture backend.
    let registry = SessionRegistry::new(
        Arc::new(CpalBackend::new()),
        jobs_tx,
        status_tx.clone(),
        config.audio.sample_rate,
        config.audio.channels,
        config.recording.min_duration(),
    );
    let gesture = GestureHandler::new(registry.clone(), mode, trigger_keys, cancel_key);

    // Transcription worker: Whisper model -> keystroke injection.
    let transcriber = Arc::new(WhisperService::new(config.whisper.clone())?);
    let worker = TranscriptionWorker::new(
        transcriber,
        Arc::new(SendInputInjector::new()),
        status_tx,
        config.audio.sample_rate,
    );
    let worker_handle = tokio::spawn(worker.run(jobs_rx, shutdown_rx));

    // Status display.
    let status_handle = tokio::spawn(status::run(status_rx));

    // Global key listener.
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    spawn_key_listener(key_tx)?;
    tracing::info!("Key listener started; press Ctrl+C to exit");

    // Dispatch loop.
    loop {
        tokio::select! {
            event = key_rx.recv() => match event {
                Some(KeyEvent::Press(key)) => gesture.on_press(key),
                Some(KeyEvent::Release(key)) => gesture.on_release(key),
                None => {
                    tracing::error!("Key listener channel closed unexpectedly");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; shutting down");
                break;
            }
        }
    }

    // Discard any in-flight recording and stop the worker.
    registry.cancel_all();
    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    status_handle.abort();

    tracing::info!("Murmur stopped");
    Ok(())
}
