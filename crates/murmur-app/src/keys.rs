//! Mapping from rdev global key events to Murmur key identities.

use murmur_core::types::{KeyInput, NamedKey};
use rdev::Key;

/// Map a raw rdev key to a `KeyInput`, if Murmur can trigger on it.
///
/// Keys with no mapping (arrows, numpad, punctuation) return `None` and are
/// ignored upstream.
pub fn map_key(key: Key) -> Option<KeyInput> {
    let named = match key {
        Key::Alt => Some(NamedKey::AltLeft),
        Key::AltGr => Some(NamedKey::AltRight),
        Key::CapsLock => Some(NamedKey::CapsLock),
        Key::ControlLeft => Some(NamedKey::ControlLeft),
        Key::ControlRight => Some(NamedKey::ControlRight),
        Key::Escape => Some(NamedKey::Escape),
        Key::F1 => Some(NamedKey::F1),
        Key::F2 => Some(NamedKey::F2),
        Key::F3 => Some(NamedKey::F3),
        Key::F4 => Some(NamedKey::F4),
        Key::F5 => Some(NamedKey::F5),
        Key::F6 => Some(NamedKey::F6),
        Key::F7 => Some(NamedKey::F7),
        Key::F8 => Some(NamedKey::F8),
        Key::F9 => Some(NamedKey::F9),
        Key::F10 => Some(NamedKey::F10),
        Key::F11 => Some(NamedKey::F11),
        Key::F12 => Some(NamedKey::F12),
        Key::MetaLeft => Some(NamedKey::MetaLeft),
        Key::MetaRight => Some(NamedKey::MetaRight),
        Key::ShiftLeft => Some(NamedKey::ShiftLeft),
        Key::ShiftRight => Some(NamedKey::ShiftRight),
        Key::Space => Some(NamedKey::Space),
        Key::Tab => Some(NamedKey::Tab),
        _ => None,
    };
    if let Some(named) = named {
        return Some(KeyInput::Named(named));
    }

    let character = match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',
        Key::Num0 => '0',
        Key::Num1 => '1',
        Key::Num2 => '2',
        Key::Num3 => '3',
        Key::Num4 => '4',
        Key::Num5 => '5',
        Key::Num6 => '6',
        Key::Num7 => '7',
        Key::Num8 => '8',
        Key::Num9 => '9',
        _ => return None,
    };
    Some(KeyInput::Character(character))
}
