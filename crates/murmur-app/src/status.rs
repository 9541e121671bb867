//! Single-line terminal status display.
//!
//! Renders each status event on one line, rewriting it in place with a
//! carriage return. Transient outcomes (a transcription, a cancel, an error)
//! revert to the idle prompt after a short hold so the user can read them.

use std::io::Write;
use std::time::Duration;

use tokio::time::Instant;

use murmur_core::types::{StatusEvent, StatusReceiver};

const READY_LINE: &str = "Ready";
const HOLD: Duration = Duration::from_secs(3);

/// Render a status event as a display line.
pub fn line_for(event: &StatusEvent) -> String {
    match event {
        StatusEvent::Ready => READY_LINE.to_string(),
        StatusEvent::Recording => "Recording...".to_string(),
        StatusEvent::Processing => "Transcribing...".to_string(),
        StatusEvent::Transcribed(text) => format!("Typed: {}", text),
        StatusEvent::NoSpeech => "(no speech detected)".to_string(),
        StatusEvent::Cancelled => "Cancelled".to_string(),
        StatusEvent::Error(e) => format!("Error: {}", e),
    }
}

/// Whether the display should fall back to the idle prompt after this event.
fn is_transient(event: &StatusEvent) -> bool {
    matches!(
        event,
        StatusEvent::Transcribed(_)
            | StatusEvent::NoSpeech
            | StatusEvent::Cancelled
            | StatusEvent::Error(_)
    )
}

fn render(line: &str, previous_len: &mut usize) {
    let pad = previous_len.saturating_sub(line.chars().count());
    print!("\r{}{}", line, " ".repeat(pad));
    let _ = std::io::stdout().flush();
    *previous_len = line.chars().count();
}

/// Consume status events until the channel closes.
pub async fn run(mut status: StatusReceiver) {
    let mut previous_len = 0usize;
    let mut revert_at: Option<Instant> = None;
    render(READY_LINE, &mut previous_len);

    loop {
        let revert = async {
            match revert_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = status.recv() => match event {
                Some(event) => {
                    revert_at = is_transient(&event).then(|| Instant::now() + HOLD);
                    render(&line_for(&event), &mut previous_len);
                }
                None => break,
            },
            _ = revert => {
                revert_at = None;
                render(READY_LINE, &mut previous_len);
            }
        }
    }

    println!();
}
