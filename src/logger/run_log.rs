//! Per-run diagnostics: warnings on stderr plus the optional JSONL activity log.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::time::Instant;

use crate::core::errors::BduError;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Run-scoped sink for warnings and lifecycle events.
pub struct RunLog {
    writer: Option<JsonlWriter>,
    quiet: bool,
    warnings: u64,
    started: Instant,
    job_id: Option<u64>,
    config_hash: Option<String>,
}

impl RunLog {
    /// No activity log; warnings still go to stderr.
    pub fn silent() -> Self {
        Self {
            writer: None,
            quiet: false,
            warnings: 0,
            started: Instant::now(),
            job_id: None,
            config_hash: None,
        }
    }

    /// Log through `jsonl` (when given); `quiet` suppresses stderr warnings.
    pub fn open(jsonl: Option<JsonlConfig>, quiet: bool) -> Self {
        Self {
            writer: jsonl.map(JsonlWriter::open),
            quiet,
            ..Self::silent()
        }
    }

    #[must_use]
    pub fn with_job(mut self, job_id: Option<u64>) -> Self {
        self.job_id = job_id;
        self
    }

    #[must_use]
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn run_started(&mut self, details: impl Into<String>) {
        self.started = Instant::now();
        let mut entry = self.entry(EventType::RunStart, Severity::Info);
        entry.details = Some(details.into());
        self.write(&entry);
    }

    /// Non-fatal problem: counted, printed unless quiet, and logged.
    pub fn warn(&mut self, err: &BduError) {
        self.warnings += 1;
        if !self.quiet {
            let _ = writeln!(io::stderr(), "bdu: warning: {err}");
        }
        let entry = self.error_entry(event_for(err), Severity::Warning, err);
        self.write(&entry);
    }

    /// Fatal error ending the run. Only logged; the caller reports it.
    pub fn failed(&mut self, err: &BduError) {
        let entry = self.error_entry(event_for(err), Severity::Critical, err);
        self.write(&entry);
    }

    pub fn run_completed(&mut self, records: u64, entries: u64, details: Option<String>) {
        let mut entry = self.entry(EventType::RunComplete, Severity::Info);
        entry.records = Some(records);
        entry.entries = Some(entries);
        entry.details = details;
        entry.duration_ms = Some(u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX));
        self.write(&entry);
    }

    pub const fn warnings(&self) -> u64 {
        self.warnings
    }

    fn entry(&self, event: EventType, severity: Severity) -> LogEntry {
        let mut entry = LogEntry::new(event, severity);
        entry.job_id = self.job_id;
        entry.config_hash.clone_from(&self.config_hash);
        entry
    }

    fn error_entry(&self, event: EventType, severity: Severity, err: &BduError) -> LogEntry {
        let mut entry = LogEntry::from_error(event, severity, err);
        entry.job_id = self.job_id;
        entry.config_hash.clone_from(&self.config_hash);
        entry
    }

    fn write(&mut self, entry: &LogEntry) {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_entry(entry);
        }
    }
}

const fn event_for(err: &BduError) -> EventType {
    match err {
        BduError::DigestPadding { .. } => EventType::DigestPadding,
        BduError::Decode { .. } => EventType::DecodeFailure,
        _ => EventType::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn silent_log_counts_warnings() {
        let mut log = RunLog::open(None, true);
        log.warn(&BduError::decode("A!", "bad symbol"));
        log.warn(&BduError::decode("B!", "bad symbol"));
        assert_eq!(log.warnings(), 2);
    }

    #[test]
    fn lifecycle_is_written_with_job_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let mut log = RunLog::open(Some(JsonlConfig::at(&path)), true)
                .with_job(Some(7))
                .with_config_hash("0000000000000abc");
            log.run_started("mode=summary");
            log.warn(&BduError::DigestPadding {
                encoded: "x".to_string(),
                hex: "0".repeat(32),
            });
            log.run_completed(10, 4, None);
        }

        let entries = lines(&path);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["event"], "run_start");
        assert_eq!(entries[0]["details"], "mode=summary");
        assert_eq!(entries[1]["event"], "digest_padding");
        assert_eq!(entries[1]["severity"], "warning");
        assert_eq!(entries[2]["event"], "run_complete");
        assert_eq!(entries[2]["records"], 10);
        assert!(entries.iter().all(|e| e["job_id"] == 7));
        assert!(entries.iter().all(|e| e["config_hash"] == "0000000000000abc"));
    }

    #[test]
    fn failure_is_critical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail.jsonl");
        {
            let mut log = RunLog::open(Some(JsonlConfig::at(&path)), true);
            log.failed(&BduError::FormatUnimplemented { letter: 'C' });
            log.failed(&BduError::decode("A!", "bad symbol"));
        }
        let entries = lines(&path);
        assert_eq!(entries[0]["event"], "error");
        assert_eq!(entries[0]["severity"], "critical");
        assert_eq!(entries[0]["error_code"], "BDU-1201");
        assert_eq!(entries[1]["event"], "decode_failure");
        assert_eq!(entries[1]["error_code"], "BDU-2001");
    }

    #[test]
    fn unopenable_log_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain-file");
        fs::write(&blocker, b"x").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        {
            let config = JsonlConfig::at(blocker.join("run.jsonl"))
                .with_fallback(Some(fallback.clone()));
            let mut log = RunLog::open(Some(config), true);
            log.run_started("mode=usage");
        }
        assert_eq!(lines(&fallback)[0]["event"], "run_start");
    }
}
