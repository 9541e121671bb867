//! Text injection into the focused application.

use std::sync::Mutex;

use murmur_core::error::MurmurError;

/// Destination for transcribed text.
pub trait TextSink: Send + Sync {
    /// Deliver text to the focused application as keystrokes.
    fn type_text(&self, text: &str) -> Result<(), MurmurError>;
}

/// Types text via the Windows SendInput API as Unicode key events.
///
/// Each character becomes a key-down/key-up pair with KEYEVENTF_UNICODE,
/// which works regardless of keyboard layout.
#[derive(Debug, Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
impl TextSink for SendInputInjector {
    fn type_text(&self, text: &str) -> Result<(), MurmurError> {
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE,
        };

        if text.is_empty() {
            return Ok(());
        }

        let mut inputs: Vec<INPUT> = Vec::with_capacity(text.encode_utf16().count() * 2);

        for unit in text.encode_utf16() {
            let mut down: INPUT = unsafe { std::mem::zeroed() };
            down.r#type = INPUT_KEYBOARD;
            down.Anonymous.ki = KEYBDINPUT {
                wVk: 0,
                wScan: unit,
                dwFlags: KEYEVENTF_UNICODE,
                time: 0,
                dwExtraInfo: 0,
            };

            let mut up = down;
            unsafe {
                up.Anonymous.ki.dwFlags = KEYEVENTF_UNICODE | KEYEVENTF_KEYUP;
            }

            inputs.push(down);
            inputs.push(up);
        }

        let sent = unsafe {
            SendInput(
                inputs.len() as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        };

        if sent as usize != inputs.len() {
            return Err(MurmurError::Injection(format!(
                "SendInput delivered {} of {} events",
                sent,
                inputs.len()
            )));
        }

        tracing::debug!(chars = text.chars().count(), "Typed text into focused window");
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
impl TextSink for SendInputInjector {
    fn type_text(&self, _text: &str) -> Result<(), MurmurError> {
        Err(MurmurError::Injection(
            "Text injection is only supported on Windows".to_string(),
        ))
    }
}

/// Records typed text instead of injecting it. For tests.
#[derive(Debug, Default)]
pub struct MockTextSink {
    typed: Mutex<Vec<String>>,
}

impl MockTextSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything typed so far, in order.
    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().expect("sink mutex poisoned").clone()
    }
}

impl TextSink for MockTextSink {
    fn type_text(&self, text: &str) -> Result<(), MurmurError> {
        self.typed
            .lock()
            .expect("sink mutex poisoned")
            .push(text.to_string());
        Ok(())
    }
}
