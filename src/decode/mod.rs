//! Decoders for the compact metadata the catalog stores per file: base-64
//! integers, lstat snapshots, and content digests.

pub mod base64;
pub mod digest;
pub mod lstat;
