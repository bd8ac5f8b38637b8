//! 128-bit content digests stored as 22 base-64 symbols.
//!
//! 22 symbols carry 132 bits: the digest followed by four zero padding bits.
//! Decoding works in six groups (five of 4 symbols, one of 2) so every
//! intermediate fits in a `u32`; the groups land on hex-digit boundaries, so
//! their concatenation is exactly the monolithic big-endian value.

use std::fmt::Write as _;

use crate::core::errors::{BduError, Result};
use crate::decode::base64::{ALPHABET, ZERO_SYMBOL, digit_value};

/// Symbols in an encoded 128-bit digest.
pub const DIGEST_SYMBOLS: usize = 22;

/// Stored instead of a digest for entries that have none.
pub const NO_DIGEST: &str = "0";

/// Decode an encoded digest to 32 lowercase hex digits.
///
/// Returns `Ok(None)` for the no-digest sentinel (and for an empty value).
/// Non-zero padding bits yield [`BduError::DigestPadding`], which still carries
/// the decoded hex so callers may choose to downgrade it to a warning.
pub fn decode_digest(encoded: &str) -> Result<Option<String>> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() || trimmed == NO_DIGEST {
        return Ok(None);
    }
    if trimmed.len() > DIGEST_SYMBOLS {
        return Err(BduError::decode(
            encoded,
            format!(
                "digest has {} symbols, at most {DIGEST_SYMBOLS} expected",
                trimmed.len()
            ),
        ));
    }

    let mut symbols = [ZERO_SYMBOL; DIGEST_SYMBOLS];
    let pad = DIGEST_SYMBOLS - trimmed.len();
    for (offset, byte) in trimmed.bytes().enumerate() {
        if digit_value(byte).is_none() {
            return Err(BduError::decode(
                encoded,
                format!(
                    "invalid base64 symbol {:?} at offset {offset}",
                    char::from(byte)
                ),
            ));
        }
        symbols[pad + offset] = byte;
    }

    let mut hex = String::with_capacity(33);
    for group in symbols[..20].chunks(4) {
        let _ = write!(hex, "{:06x}", group_value(group));
    }
    let _ = write!(hex, "{:03x}", group_value(&symbols[20..]));

    let padding = hex.pop();
    if padding != Some('0') {
        return Err(BduError::DigestPadding {
            encoded: encoded.to_string(),
            hex,
        });
    }
    Ok(Some(hex))
}

fn group_value(group: &[u8]) -> u32 {
    group.iter().fold(0u32, |acc, symbol| {
        (acc << 6) | u32::from(digit_value(*symbol).unwrap_or(0))
    })
}

/// Encode a 128-bit digest as 22 symbols with zero padding bits.
#[must_use]
pub fn encode_digest(value: u128) -> String {
    (0..DIGEST_SYMBOLS)
        .map(|index| {
            let shift = 6 * (DIGEST_SYMBOLS - 1 - index) as u32;
            let sextet = if shift >= 4 {
                (value >> (shift - 4)) & 63
            } else {
                (value << (4 - shift)) & 63
            };
            char::from(ALPHABET[sextet as usize])
        })
        .collect()
}
