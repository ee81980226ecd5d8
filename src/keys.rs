//! Logical key identifiers and their translation to platform key codes.
//!
//! Callers name keys three ways: a single character ("w"), a named token
//! ("shift"), or a raw virtual-key integer. Each must map to exactly one
//! `KeyCode` or fail; nothing defaults silently.

use serde::Deserialize;

use crate::error::{GestureError, Result};

/// Platform-level virtual-key code.
///
/// The values follow the Win32 VK_* table; the Linux backend maps them to
/// X11 keysyms at the point of injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(u16);

impl KeyCode {
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ALT: KeyCode = KeyCode(0x12);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);

    pub const fn new(value: u16) -> Self {
        KeyCode(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VK=0x{:02X}", self.0)
    }
}

/// Wire-facing key identifier as it arrives in a parameter object:
/// either a raw virtual-key integer or a character/name string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KeyIdent {
    Code(u16),
    Name(String),
}

impl KeyIdent {
    /// Translate to a platform key code.
    ///
    /// Rules, in order: a single-character string maps through the
    /// character table; a known named token maps to its fixed code; an
    /// integer passes through unchanged. Integers are deliberately stricter
    /// than pure passthrough: values outside the one-byte virtual-key range
    /// (1..=0xFE) are rejected here instead of being forwarded to a
    /// platform layer that cannot represent them.
    pub fn translate(&self) -> Result<KeyCode> {
        match self {
            KeyIdent::Code(code) => {
                // VK codes are one byte; 0 is not a key.
                if *code == 0 || *code > 0xFE {
                    return Err(GestureError::UnsupportedKey {
                        identifier: code.to_string(),
                    });
                }
                Ok(KeyCode(*code))
            }
            KeyIdent::Name(name) => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => char_to_code(ch).ok_or_else(|| {
                        GestureError::UnsupportedKey {
                            identifier: name.clone(),
                        }
                    }),
                    _ => named_to_code(name).ok_or_else(|| GestureError::UnsupportedKey {
                        identifier: name.clone(),
                    }),
                }
            }
        }
    }
}

/// Map a single character to its virtual-key code.
///
/// ASCII letters and digits share their uppercase ASCII value with the VK
/// table; everything else is unsupported.
fn char_to_code(ch: char) -> Option<KeyCode> {
    match ch {
        'a'..='z' => Some(KeyCode(ch.to_ascii_uppercase() as u16)),
        'A'..='Z' | '0'..='9' => Some(KeyCode(ch as u16)),
        ' ' => Some(KeyCode::SPACE),
        _ => None,
    }
}

/// Map a named token (multi-character) to its fixed code.
fn named_to_code(name: &str) -> Option<KeyCode> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Some(KeyCode::SHIFT),
        "ctrl" => Some(KeyCode::CONTROL),
        "alt" => Some(KeyCode::ALT),
        "space" => Some(KeyCode::SPACE),
        _ => None,
    }
}

/// Translate a direction token to its key code.
///
/// Directions are a closed set: 'w'/'a'/'s'/'d' and the four arrow names.
/// Unknown tokens fail rather than defaulting to any direction.
pub fn direction_to_code(direction: &str) -> Result<KeyCode> {
    match direction.to_ascii_lowercase().as_str() {
        "w" => Ok(KeyCode(b'W' as u16)),
        "a" => Ok(KeyCode(b'A' as u16)),
        "s" => Ok(KeyCode(b'S' as u16)),
        "d" => Ok(KeyCode(b'D' as u16)),
        "up" => Ok(KeyCode::UP),
        "down" => Ok(KeyCode::DOWN),
        "left" => Ok(KeyCode::LEFT),
        "right" => Ok(KeyCode::RIGHT),
        _ => Err(GestureError::UnsupportedKey {
            identifier: direction.to_string(),
        }),
    }
}
