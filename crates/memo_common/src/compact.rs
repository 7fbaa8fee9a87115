//! Compact base-64 encoding of integers.
//!
//! Hash values are 128 bits wide; rendered in decimal they would make cache
//! file names unreadably long. This module maps integers onto a fixed
//! 64-symbol alphabet that is legal in file names on every common platform.

use crate::error::DecodeError;

/// The 64 digit symbols, in value order.
pub const ALPHABET: &[u8; 64] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+=";

/// Prefix marking a negative value in [`encode`] output.
pub const NEGATIVE_MARKER: char = '~';

const BASE: u128 = 64;

/// Encodes an unsigned value. Zero encodes as `"0"`.
pub fn encode_unsigned(mut value: u128) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(ALPHABET[(value % BASE) as usize]);
        value /= BASE;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    // Every byte comes from the ASCII alphabet.
    digits.into_iter().map(char::from).collect()
}

/// Encodes a signed value, prefixing negatives with [`NEGATIVE_MARKER`].
pub fn encode(value: i128) -> String {
    if value < 0 {
        format!("{NEGATIVE_MARKER}{}", encode_unsigned(value.unsigned_abs()))
    } else {
        encode_unsigned(value as u128)
    }
}

/// Decodes a string produced by [`encode_unsigned`].
pub fn decode_unsigned(encoded: &str) -> Result<u128, DecodeError> {
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut number: u128 = 0;
    for (position, symbol) in encoded.char_indices() {
        let digit = symbol_value(symbol).ok_or(DecodeError::InvalidSymbol { symbol, position })?;
        number = number
            .checked_mul(BASE)
            .and_then(|n| n.checked_add(u128::from(digit)))
            .ok_or(DecodeError::Overflow)?;
    }
    Ok(number)
}

/// Decodes a string produced by [`encode`].
pub fn decode(encoded: &str) -> Result<i128, DecodeError> {
    match encoded.strip_prefix(NEGATIVE_MARKER) {
        Some(rest) => {
            let magnitude = decode_unsigned(rest)?;
            if magnitude == i128::MIN.unsigned_abs() {
                Ok(i128::MIN)
            } else {
                i128::try_from(magnitude)
                    .map(|m| -m)
                    .map_err(|_| DecodeError::Overflow)
            }
        }
        None => i128::try_from(decode_unsigned(encoded)?).map_err(|_| DecodeError::Overflow),
    }
}

fn symbol_value(symbol: char) -> Option<u8> {
    let byte = u8::try_from(symbol).ok()?;
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'z' => Some(byte - b'a' + 10),
        b'A'..=b'Z' => Some(byte - b'A' + 36),
        b'+' => Some(62),
        b'=' => Some(63),
        _ => None,
    }
}
