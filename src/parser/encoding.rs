//! String encoding modes
//!
//! Lua strings are byte strings while the source handed to the lexer is
//! Unicode text. An [`EncodingMode`] decides how escape sequences and raw
//! string content are mapped onto `char`s in decoded literal values:
//!
//! - [`EncodingMode::Identity`]: every byte maps to the code point of the
//!   same value (pseudo-Latin-1); content above U+00FF is rejected.
//! - [`EncodingMode::PrivateUse`]: bytes `0x80..=0xFF` map into the private
//!   use block `U+F780..=U+F7FF`; ASCII stays as is.
//! - [`EncodingMode::Discard`]: string contents are not decoded at all, which
//!   is all an editor needs when it only cares about syntax.

use serde::Serialize;

const PRIVATE_USE_MASK: u32 = 0xF700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EncodingMode {
    Identity,
    PrivateUse,
    #[default]
    Discard,
}

impl EncodingMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "identity" | "pseudo-latin1" => Some(EncodingMode::Identity),
            "private-use" | "x-user-defined" => Some(EncodingMode::PrivateUse),
            "discard" | "none" => Some(EncodingMode::Discard),
            _ => None,
        }
    }

    /// Whether decoded string values are dropped entirely.
    pub fn discards_strings(self) -> bool {
        matches!(self, EncodingMode::Discard)
    }

    /// Validate raw source content copied into a literal or identifier.
    ///
    /// Returns the first offending character when the content cannot be
    /// represented in this mode.
    pub fn validate(self, content: &str) -> Result<(), char> {
        let bad = match self {
            EncodingMode::Identity => content.chars().find(|&ch| ch as u32 > 0xFF),
            EncodingMode::PrivateUse => content
                .chars()
                .find(|&ch| !(ch.is_ascii() || (0xF780..=0xF7FF).contains(&(ch as u32)))),
            EncodingMode::Discard => None,
        };
        match bad {
            Some(ch) => Err(ch),
            None => Ok(()),
        }
    }

    /// Encode one byte produced by a `\ddd` or `\xXX` escape.
    pub fn encode_byte(self, value: u8) -> Option<char> {
        match self {
            EncodingMode::Identity => Some(char::from(value)),
            EncodingMode::PrivateUse if value >= 0x80 => {
                char::from_u32(u32::from(value) | PRIVATE_USE_MASK)
            }
            EncodingMode::PrivateUse => Some(char::from(value)),
            EncodingMode::Discard => None,
        }
    }

    /// Encode a `\u{XXXX}` escape: the UTF-8 byte sequence of `codepoint`,
    /// each byte encoded with [`EncodingMode::encode_byte`].
    pub fn encode_codepoint(self, codepoint: u32) -> String {
        if self.discards_strings() {
            return String::new();
        }
        utf8_bytes(codepoint)
            .into_iter()
            .filter_map(|byte| self.encode_byte(byte))
            .collect()
    }
}

/// UTF-8 style byte sequence for any value up to `0x7FFF_FFFF` (the
/// original six-byte scheme, which Lua accepts in `\u{}` escapes).
fn utf8_bytes(codepoint: u32) -> Vec<u8> {
    match codepoint {
        0..=0x7F => vec![codepoint as u8],
        0x80..=0x7FF => vec![
            0xC0 | (codepoint >> 6) as u8,
            0x80 | (codepoint & 0x3F) as u8,
        ],
        0x800..=0xFFFF => vec![
            0xE0 | (codepoint >> 12) as u8,
            0x80 | ((codepoint >> 6) & 0x3F) as u8,
            0x80 | (codepoint & 0x3F) as u8,
        ],
        0x1_0000..=0x1F_FFFF => vec![
            0xF0 | (codepoint >> 18) as u8,
            0x80 | ((codepoint >> 12) & 0x3F) as u8,
            0x80 | ((codepoint >> 6) & 0x3F) as u8,
            0x80 | (codepoint & 0x3F) as u8,
        ],
        0x20_0000..=0x3FF_FFFF => vec![
            0xF8 | (codepoint >> 24) as u8,
            0x80 | ((codepoint >> 18) & 0x3F) as u8,
            0x80 | ((codepoint >> 12) & 0x3F) as u8,
            0x80 | ((codepoint >> 6) & 0x3F) as u8,
            0x80 | (codepoint & 0x3F) as u8,
        ],
        _ => vec![
            0xFC | (codepoint >> 30) as u8,
            0x80 | ((codepoint >> 24) & 0x3F) as u8,
            0x80 | ((codepoint >> 18) & 0x3F) as u8,
            0x80 | ((codepoint >> 12) & 0x3F) as u8,
            0x80 | ((codepoint >> 6) & 0x3F) as u8,
            0x80 | (codepoint & 0x3F) as u8,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_bytes() {
        assert_eq!(EncodingMode::Identity.encode_byte(0x41), Some('A'));
        assert_eq!(EncodingMode::Identity.encode_byte(0xE9), Some('\u{E9}'));
        assert_eq!(EncodingMode::Identity.encode_codepoint(0xE9), "\u{C3}\u{A9}");
    }

    #[test]
    fn test_private_use_bytes() {
        assert_eq!(EncodingMode::PrivateUse.encode_byte(0x41), Some('A'));
        assert_eq!(EncodingMode::PrivateUse.encode_byte(0x80), Some('\u{F780}'));
        assert_eq!(EncodingMode::PrivateUse.encode_byte(0xFF), Some('\u{F7FF}'));
        assert_eq!(
            EncodingMode::PrivateUse.encode_codepoint(0xE9),
            "\u{F7C3}\u{F7A9}"
        );
    }

    #[test]
    fn test_content_validation() {
        assert!(EncodingMode::Identity.validate("caf\u{E9}").is_ok());
        assert_eq!(EncodingMode::Identity.validate("\u{2605}"), Err('\u{2605}'));
        assert!(EncodingMode::PrivateUse.validate("a\u{F790}").is_ok());
        assert_eq!(EncodingMode::PrivateUse.validate("\u{E9}"), Err('\u{E9}'));
        assert!(EncodingMode::Discard.validate("\u{1F17E}").is_ok());
    }

    #[test]
    fn test_discard_produces_nothing() {
        assert_eq!(EncodingMode::Discard.encode_byte(0x41), None);
        assert_eq!(EncodingMode::Discard.encode_codepoint(0x41), "");
    }
}
