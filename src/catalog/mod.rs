//! Record sources: where `(directory, filename, payload)` tuples come from.
//!
//! The report engine only needs an ordered stream of [`CatalogRecord`]s for
//! one job. [`lines::LineSource`] reads them from tab-separated text;
//! `sqlite::SqliteCatalog` queries a catalog database directly.

#![allow(missing_docs)]

pub mod lines;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// One catalog entry as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Directory path as stored, normally with a trailing slash.
    pub directory: String,
    /// File name; empty for the directory's own entry.
    pub filename: String,
    /// Encoded lstat or digest, depending on what was asked for.
    pub payload: Option<String>,
}

impl CatalogRecord {
    pub fn new(directory: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Which encoded column a source should deliver as the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadKind {
    #[default]
    LStat,
    Digest,
}

/// What to fetch for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub job_id: u64,
    /// Only directories starting with this string (an optimization; the
    /// aggregator applies the exact scope).
    pub path_prefix: Option<String>,
    pub payload: PayloadKind,
    /// Deliver entries the catalog marks as deleted (file index 0).
    pub include_deleted: bool,
}

impl RecordQuery {
    #[must_use]
    pub const fn for_job(job_id: u64) -> Self {
        Self {
            job_id,
            path_prefix: None,
            payload: PayloadKind::LStat,
            include_deleted: false,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.path_prefix = prefix;
        self
    }

    #[must_use]
    pub const fn with_payload(mut self, payload: PayloadKind) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub const fn with_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }
}
