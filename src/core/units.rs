//! Human-readable byte counts: `"512"`, `"10k"`, `"1Ki"`, `"2GiB"`.
//!
//! Plain suffixes (`k`, `M`, `G`, `T`, `P`) are powers of 1000, `i` suffixes
//! (`Ki`/`ki`, `Mi`, `Gi`, `Ti`, `Pi`) powers of 1024. A trailing `B` is
//! accepted and ignored. A suffix without a number means one unit.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::{BduError, Result};

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)?(k|Ki|ki|M|Mi|G|Gi|T|Ti|P|Pi)?B?$").expect("size pattern is valid")
});

/// Default unit for reported usage counts.
pub const DEFAULT_BLOCK_SIZE: u64 = 1024;

/// Parse a byte-count string such as `"5M"` or `"1Ki"` into bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let err = |details: &str| BduError::UnitParse {
        input: input.to_string(),
        details: details.to_string(),
    };

    let caps = SIZE_PATTERN
        .captures(input)
        .ok_or_else(|| err("expected <number>[k|Ki|M|Mi|G|Gi|T|Ti|P|Pi][B]"))?;
    let digits = caps.get(1).map(|m| m.as_str());
    let suffix = caps.get(2).map(|m| m.as_str());
    if digits.is_none() && suffix.is_none() {
        return Err(err("missing number"));
    }

    let count = match digits {
        Some(d) => d.parse::<u64>().map_err(|_| err("number out of range"))?,
        None => 1,
    };
    let multiplier = match suffix {
        None => 1,
        Some(s) => unit_multiplier(s),
    };
    count
        .checked_mul(multiplier)
        .ok_or_else(|| err("size overflows 64 bits"))
}

fn unit_multiplier(suffix: &str) -> u64 {
    let (exp, binary) = match suffix {
        "k" => (1, false),
        "Ki" | "ki" => (1, true),
        "M" => (2, false),
        "Mi" => (2, true),
        "G" => (3, false),
        "Gi" => (3, true),
        "T" => (4, false),
        "Ti" => (4, true),
        "P" => (5, false),
        _ => (5, true),
    };
    let base: u64 = if binary { 1024 } else { 1000 };
    base.pow(exp)
}

/// Express `bytes` in units of `block_size`, rounding up.
#[must_use]
pub fn user_blocks(bytes: u64, block_size: u64) -> u64 {
    bytes.div_ceil(block_size.max(1))
}
