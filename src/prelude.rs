//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use backup_du::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{BduError, Result};
pub use crate::core::units::{parse_size, user_blocks};

// Decode
pub use crate::decode::digest::decode_digest;
pub use crate::decode::lstat::{FileStat, FileType};

// Usage
pub use crate::usage::aggregator::{AggregatorOptions, Metric, PathAggregator};
pub use crate::usage::selector::select;

// Render
pub use crate::render::format::FormatSpec;

// Catalog
pub use crate::catalog::lines::LineSource;
#[cfg(feature = "sqlite")]
pub use crate::catalog::sqlite::SqliteCatalog;
pub use crate::catalog::{CatalogRecord, PayloadKind, RecordQuery};

// Report
pub use crate::logger::run_log::RunLog;
pub use crate::report::{Report, ReportOptions, RunSummary};
