//! Modified UTF-8 as used by `CONSTANT_Utf8_info`.
//!
//! The class file encoding differs from standard UTF-8 in two ways: the NUL character is
//! written as the two byte sequence `C0 80`, and supplementary characters are written as a
//! surrogate pair with each half encoded as its own three byte sequence. Java string literals
//! may also hold unpaired surrogates, which [`Text::Wide`] keeps unchanged.

use widestring::U16String;

use crate::Result;

/// Text of one `CONSTANT_Utf8_info` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Text {
    /// Well formed text
    Unicode(String),
    /// Text with unpaired surrogates, kept as the raw UTF-16 code units
    Wide(U16String),
}

/// Decode modified UTF-8, falling back to UTF-16 code units when the text is not valid
/// Unicode. Encoding the result with [`encode`] or [`encode_wide`] reproduces `bytes` exactly.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated sequences and invalid lead bytes.
pub fn decode_text(bytes: &[u8]) -> Result<Text> {
    let units = decode_units(bytes)?;
    Ok(match String::from_utf16(&units) {
        Ok(text) => Text::Unicode(text),
        Err(_) => Text::Wide(U16String::from_vec(units)),
    })
}

fn decode_units(bytes: &[u8]) -> Result<Vec<u16>> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b0 = bytes[i];
        match b0 {
            0x01..=0x7F => {
                units.push(u16::from(b0));
                i += 1;
            }
            0xC0..=0xDF => {
                let b1 = continuation(bytes, i + 1)?;
                units.push((u16::from(b0 & 0x1F) << 6) | b1);
                i += 2;
            }
            0xE0..=0xEF => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                units.push((u16::from(b0 & 0x0F) << 12) | (b1 << 6) | b2);
                i += 3;
            }
            _ => return Err(malformed_error!("Invalid modified UTF-8 byte {:02X} at {}", b0, i)),
        }
    }

    Ok(units)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        Some(&b) => Err(malformed_error!("Invalid continuation byte {:02X} at {}", b, index)),
        None => Err(malformed_error!("Truncated modified UTF-8 sequence")),
    }
}

/// Encode a string as modified UTF-8.
#[must_use]
pub fn encode(value: &str) -> Vec<u8> {
    encode_units(value.encode_utf16())
}

/// Encode raw UTF-16 code units as modified UTF-8. Unpaired surrogates are written as three
/// byte sequences like any other unit.
#[must_use]
pub fn encode_wide(units: &U16String) -> Vec<u8> {
    encode_units(units.as_slice().iter().copied())
}

fn encode_units(units: impl Iterator<Item = u16>) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
