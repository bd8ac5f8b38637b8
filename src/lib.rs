#![forbid(unsafe_code)]

//! backup_du (bdu): `du` and `stat` views over a backup catalog.
//!
//! Nothing here touches a live filesystem. Usage is reconstructed from the
//! encoded lstat and digest strings a catalog stores per file:
//! 1. **Decode**: base-64 lstat fields and 128-bit digests
//! 2. **Aggregate**: roll usage up a directory tree implied by path strings
//! 3. **Select and render**: top-N/threshold filtering, summary lines or a
//!    stat(1)-style template
//!
//! # Library usage
//!
//! ```rust,no_run
//! use backup_du::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use backup_du::core::config::Config;
//! use backup_du::report::{Report, ReportOptions};
//! ```

pub mod prelude;

pub mod catalog;
pub mod core;
pub mod decode;
pub mod logger;
pub mod render;
pub mod report;
pub mod usage;
