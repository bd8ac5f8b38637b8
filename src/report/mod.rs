//! Report pipeline: records in, printed lines out.
//!
//! [`UsageReport`] drives the du-style summary and custom-format modes: every
//! record is decoded and credited, and only once the source is exhausted are
//! entries selected and printed. [`DigestLister`] prints one line per record
//! as it arrives.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::io::Write;
use std::num::NonZeroUsize;

use serde::Serialize;

use crate::catalog::CatalogRecord;
use crate::core::config::ReportConfig;
use crate::core::errors::{BduError, Result};
use crate::core::units::user_blocks;
use crate::decode::digest::decode_digest;
use crate::decode::lstat::{FileStat, FileType, SECTOR_SIZE};
use crate::logger::run_log::RunLog;
use crate::render::format::FormatSpec;
use crate::render::lines::{digest_line, summary_line};
use crate::usage::aggregator::{
    AggregatorOptions, Metric, PathAggregator, RootScope, join_path, normalize_dir,
};
use crate::usage::selector::{effective_threshold, select};

/// Everything one run needs, resolved from config and flags.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub metric: Metric,
    /// Minimum accumulated value (bytes, or entries in count mode).
    pub threshold: u64,
    pub block_size: u64,
    pub top: Option<NonZeroUsize>,
    pub format: Option<String>,
    pub aggregator: AggregatorOptions,
    pub utc: bool,
    pub strict_digest_padding: bool,
}

impl ReportOptions {
    /// Resolve size strings and flags. `target` is the optional path argument.
    pub fn from_config(report: &ReportConfig, target: Option<&str>, utc: bool) -> Result<Self> {
        let block_size = report.block_size_bytes()?;
        if block_size == 0 {
            return Err(BduError::InvalidConfig {
                details: "report.block_size must be greater than zero".to_string(),
            });
        }
        let top = match report.top {
            Some(n) => Some(NonZeroUsize::new(n).ok_or_else(|| BduError::InvalidConfig {
                details: "report.top must be greater than zero".to_string(),
            })?),
            None => None,
        };
        Ok(Self {
            metric: Metric::from_flags(report.apparent_size, report.count),
            threshold: report.threshold_bytes()?,
            block_size,
            top,
            format: report.format.clone(),
            aggregator: AggregatorOptions {
                target: target.map(str::to_string),
                separate_dirs: report.separate_dirs,
                include_files: report.all_files,
            },
            utc,
            strict_digest_padding: report.strict_digest_padding,
        })
    }
}

/// Counters reported at the end of a run (and written to the activity log).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Records delivered by the source.
    pub records: u64,
    /// Records outside the scope, or with nothing to print.
    pub skipped: u64,
    /// Distinct paths accumulated.
    pub entries: u64,
    /// Lines (or rendered blocks) written.
    pub emitted: u64,
    pub effective_threshold: u64,
}

/// du-style usage report over one job's records.
#[derive(Debug)]
pub struct UsageReport {
    aggregator: PathAggregator,
    format: Option<FormatSpec>,
    retained: HashMap<String, FileStat>,
    threshold: u64,
    block_size: u64,
    top: Option<NonZeroUsize>,
    records: u64,
    skipped: u64,
}

impl UsageReport {
    /// Fails before any record is read when the format template is bad.
    pub fn new(options: &ReportOptions) -> Result<Self> {
        let format = options
            .format
            .as_deref()
            .map(|template| {
                FormatSpec::compile(template, options.block_size).map(|spec| spec.with_utc(options.utc))
            })
            .transpose()?;
        Ok(Self {
            aggregator: PathAggregator::new(options.metric, &options.aggregator),
            format,
            retained: HashMap::new(),
            threshold: options.threshold,
            block_size: options.block_size,
            top: options.top,
            records: 0,
            skipped: 0,
        })
    }

    /// Decode and credit one record.
    pub fn ingest(&mut self, record: &CatalogRecord) -> Result<()> {
        self.records += 1;
        let scope = self.aggregator.scope();
        if !scope.accepts(&record.directory, &record.filename) {
            self.skipped += 1;
            return Ok(());
        }

        let needs_stat = self.aggregator.metric().needs_stat();
        let stat = match record.payload.as_deref() {
            Some(payload) if needs_stat || self.format.is_some() => {
                Some(FileStat::decode(payload)?)
            }
            None if needs_stat => {
                let path = join_path(normalize_dir(&record.directory), &record.filename);
                return Err(BduError::decode(&path, "record has no lstat"));
            }
            _ => None,
        };

        self.aggregator
            .record(&record.directory, &record.filename, stat.as_ref());

        if let Some(stat) = stat.filter(|_| self.format.is_some()) {
            if let Some(key) = self.retain_key(record) {
                self.retained.insert(key, stat);
            }
        }
        Ok(())
    }

    /// Key under which a record's own stat is kept for rendering, if any.
    ///
    /// Only kept when individual entries are listed: with `--all`, or for a
    /// target that names a single file.
    fn retain_key(&self, record: &CatalogRecord) -> Option<String> {
        let directory = normalize_dir(&record.directory);
        if self.aggregator.include_files() {
            return Some(if record.filename.is_empty() {
                directory.to_string()
            } else {
                join_path(directory, &record.filename)
            });
        }
        let is_target = !record.filename.is_empty()
            && self.aggregator.scope().is_target_file(directory, &record.filename);
        is_target.then(|| join_path(directory, &record.filename))
    }

    #[must_use]
    pub fn scope(&self) -> &RootScope {
        self.aggregator.scope()
    }

    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Select and print the surviving entries, children before parents.
    pub fn finish<W: Write>(self, out: &mut W) -> Result<RunSummary> {
        let usage = self.aggregator.usage();
        let floor = effective_threshold(usage, self.threshold, self.top);
        let selected = select(usage, self.threshold, self.top);
        let metric = self.aggregator.metric();
        let mut emitted = 0_u64;

        for (path, value) in &selected {
            match &self.format {
                Some(spec) => {
                    let stat = match self.retained.get(*path) {
                        Some(stat) if stat.file_type() == FileType::Directory => {
                            with_usage(*stat, *value)
                        }
                        Some(stat) => *stat,
                        None => with_usage(FileStat::default(), *value),
                    };
                    let rendered = spec.render(path, &stat);
                    out.write_all(rendered.as_bytes())
                        .map_err(|source| BduError::Output { source })?;
                    if !spec.ends_with_newline() {
                        out.write_all(b"\n")
                            .map_err(|source| BduError::Output { source })?;
                    }
                }
                None => {
                    let shown = match metric {
                        Metric::Count => *value,
                        Metric::Blocks | Metric::ApparentSize => {
                            user_blocks(*value, self.block_size)
                        }
                    };
                    writeln!(out, "{}", summary_line(shown, path))
                        .map_err(|source| BduError::Output { source })?;
                }
            }
            emitted += 1;
        }
        out.flush().map_err(|source| BduError::Output { source })?;

        Ok(RunSummary {
            records: self.records,
            skipped: self.skipped,
            entries: usage.len() as u64,
            emitted,
            effective_threshold: floor,
        })
    }
}

/// A directory rendered with the usage it was selected on. Without an own
/// entry every other field stays zero.
const fn with_usage(stat: FileStat, value: u64) -> FileStat {
    FileStat {
        size: value,
        blocks: value.div_ceil(SECTOR_SIZE),
        ..stat
    }
}

/// md5sum-style listing, streamed record by record.
#[derive(Debug)]
pub struct DigestLister {
    scope: RootScope,
    strict_padding: bool,
    records: u64,
    skipped: u64,
    emitted: u64,
}

impl DigestLister {
    #[must_use]
    pub fn new(options: &ReportOptions) -> Self {
        Self {
            scope: RootScope::new(options.aggregator.target.as_deref()),
            strict_padding: options.strict_digest_padding,
            records: 0,
            skipped: 0,
            emitted: 0,
        }
    }

    /// Print the record's digest line, if it has a digest and is in scope.
    ///
    /// A non-zero padding nibble is fatal in strict mode; otherwise it is
    /// reported through `log` and the line is still printed.
    pub fn list<W: Write>(
        &mut self,
        record: &CatalogRecord,
        out: &mut W,
        log: &mut RunLog,
    ) -> Result<()> {
        self.records += 1;
        let Some(payload) = record.payload.as_deref() else {
            self.skipped += 1;
            return Ok(());
        };
        if !self.scope.accepts(&record.directory, &record.filename) {
            self.skipped += 1;
            return Ok(());
        }

        let hex = match decode_digest(payload) {
            Ok(Some(hex)) => hex,
            Ok(None) => {
                self.skipped += 1;
                return Ok(());
            }
            Err(BduError::DigestPadding { encoded, hex }) if !self.strict_padding => {
                log.warn(&BduError::DigestPadding {
                    encoded,
                    hex: hex.clone(),
                });
                hex
            }
            Err(err) => return Err(err),
        };

        let path = join_path(normalize_dir(&record.directory), &record.filename);
        writeln!(out, "{}", digest_line(&hex, &path)).map_err(|source| BduError::Output { source })?;
        self.emitted += 1;
        Ok(())
    }

    pub fn finish<W: Write>(self, out: &mut W) -> Result<RunSummary> {
        out.flush().map_err(|source| BduError::Output { source })?;
        Ok(RunSummary {
            records: self.records,
            skipped: self.skipped,
            entries: self.emitted,
            emitted: self.emitted,
            effective_threshold: 0,
        })
    }
}

/// One run in either output mode.
#[derive(Debug)]
pub enum Report {
    Usage(UsageReport),
    Digest(DigestLister),
}

impl Report {
    pub fn new(options: &ReportOptions, digests: bool) -> Result<Self> {
        if digests {
            Ok(Self::Digest(DigestLister::new(options)))
        } else {
            UsageReport::new(options).map(Self::Usage)
        }
    }

    pub fn accept<W: Write>(
        &mut self,
        record: &CatalogRecord,
        out: &mut W,
        log: &mut RunLog,
    ) -> Result<()> {
        match self {
            Self::Usage(report) => report.ingest(record),
            Self::Digest(lister) => lister.list(record, out, log),
        }
    }

    pub fn finish<W: Write>(self, out: &mut W) -> Result<RunSummary> {
        match self {
            Self::Usage(report) => report.finish(out),
            Self::Digest(lister) => lister.finish(out),
        }
    }
}
