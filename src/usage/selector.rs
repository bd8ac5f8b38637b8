//! Top-N / threshold selection over a finished aggregation, and the order
//! entries are printed in.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Value a key needs to be among the `top` largest; 0 when every key fits.
#[must_use]
pub fn top_n_cutoff(values: impl IntoIterator<Item = u64>, top: NonZeroUsize) -> u64 {
    let mut values: Vec<u64> = values.into_iter().collect();
    let count = values.len();
    let top = top.get();
    if top >= count {
        return 0;
    }
    values.sort_unstable();
    values[count - top]
}

/// Threshold actually applied: `top` can raise the explicit threshold, never
/// lower it.
#[must_use]
pub fn effective_threshold(
    usage: &HashMap<String, u64>,
    threshold: u64,
    top: Option<NonZeroUsize>,
) -> u64 {
    top.map_or(threshold, |top| {
        threshold.max(top_n_cutoff(usage.values().copied(), top))
    })
}

/// Print order: byte order, except a path sorts after every path it is a
/// proper prefix of. Descendants therefore always precede their directory.
#[must_use]
pub fn emit_order(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => b.len().cmp(&a.len()),
        unequal => unequal,
    }
}

/// Entries at or above the effective threshold, in print order.
#[must_use]
pub fn select(
    usage: &HashMap<String, u64>,
    threshold: u64,
    top: Option<NonZeroUsize>,
) -> Vec<(&str, u64)> {
    let floor = effective_threshold(usage, threshold, top);
    let mut selected: Vec<(&str, u64)> = usage
        .iter()
        .filter(|&(_, &value)| value >= floor)
        .map(|(key, &value)| (key.as_str(), value))
        .collect();
    selected.sort_unstable_by(|a, b| emit_order(a.0, b.0));
    selected
}
