//! Run diagnostics: JSONL activity log with graceful degradation.

pub mod jsonl;
pub mod run_log;
