//! Fixed line shapes for summary and digest output.

/// Minimum width the usage column is right-justified to.
pub const USAGE_COLUMN_WIDTH: usize = 8;

/// `"<usage> <path>"`, usage right-justified.
#[must_use]
pub fn summary_line(usage: u64, path: &str) -> String {
    format!("{usage:>width$} {path}", width = USAGE_COLUMN_WIDTH)
}

/// `"<hex>  <path>"`, two spaces, as digest-checking tools expect.
#[must_use]
pub fn digest_line(hex: &str, path: &str) -> String {
    format!("{hex}  {path}")
}
