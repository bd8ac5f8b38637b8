//! Usage accounting: per-path accumulation and the selection of what to print.

pub mod aggregator;
pub mod selector;
