//! Big-endian base-64 integers as stored in catalog lstat fields.
//!
//! This is not RFC 4648 base64: each token is a plain positional number in
//! base 64, most significant digit first, with digit values taken from the
//! alphabet index (`A` = 0 … `/` = 63). There is no padding and no length
//! prefix.

use std::fmt;

/// Digit alphabet; a symbol's index is its value.
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Symbol with value zero, used for left padding.
pub const ZERO_SYMBOL: u8 = b'A';

/// A character outside [`ALPHABET`] found while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSymbol {
    /// The offending character.
    pub symbol: char,
    /// Byte offset of `symbol` within the token.
    pub offset: usize,
}

impl fmt::Display for InvalidSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid base64 symbol {:?} at offset {}",
            self.symbol, self.offset
        )
    }
}

/// Value of a single alphabet symbol.
#[must_use]
pub const fn digit_value(symbol: u8) -> Option<u8> {
    match symbol {
        b'A'..=b'Z' => Some(symbol - b'A'),
        b'a'..=b'z' => Some(symbol - b'a' + 26),
        b'0'..=b'9' => Some(symbol - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode one token by repeated shift-by-6-and-add.
///
/// Values wider than 64 bits wrap silently; catalog fields never exceed that
/// in practice and no width check is made.
pub fn decode_token(token: &str) -> Result<u64, InvalidSymbol> {
    token
        .char_indices()
        .try_fold(0u64, |acc, (offset, ch)| {
            let digit = u8::try_from(ch)
                .ok()
                .and_then(digit_value)
                .ok_or(InvalidSymbol { symbol: ch, offset })?;
            Ok(acc.wrapping_shl(6).wrapping_add(u64::from(digit)))
        })
}

/// Encode `value` with the minimal number of digits (`0` encodes as `"A"`).
#[must_use]
pub fn encode_value(mut value: u64) -> String {
    let mut digits = Vec::with_capacity(11);
    loop {
        digits.push(ALPHABET[(value & 63) as usize]);
        value >>= 6;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
