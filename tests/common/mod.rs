#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use backup_du::decode::lstat::FileStat;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_bdu") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "bdu.exe" } else { "bdu" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve bdu binary path for integration test"),
    }
}

/// Run `bdu` with an isolated config home so a developer's own config file
/// cannot leak into the result. A transcript lands next to the temp dir.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("bdu-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let config_home = root.join(format!("{}-{}-xdg", sanitize(case_name), now_millis()));
    fs::create_dir_all(&config_home).expect("create isolated config home");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("XDG_CONFIG_HOME", &config_home)
        .env_remove("BDU_REPORT_FORMAT")
        .env_remove("BDU_CATALOG_DATABASE")
        .env_remove("BDU_PATHS_JSONL_LOG")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute bdu command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Encoded lstat of a regular file.
pub fn file_lstat(size: u64, blocks: u64) -> String {
    FileStat {
        mode: 0o100_644,
        nlink: 1,
        uid: 1000,
        gid: 1000,
        size,
        blksize: 4096,
        blocks,
        mtime: 1_700_000_000,
        ..FileStat::default()
    }
    .encode()
}

/// Encoded lstat of a directory's own entry.
pub fn dir_lstat(size: u64) -> String {
    FileStat {
        mode: 0o40_755,
        nlink: 2,
        size,
        blksize: 4096,
        blocks: size.div_ceil(512),
        ..FileStat::default()
    }
    .encode()
}

/// Write `(directory, filename, payload)` rows as a TSV record file.
pub fn write_records(dir: &Path, name: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let body: String = rows
        .iter()
        .map(|(directory, filename, payload)| format!("{directory}\t{filename}\t{payload}\n"))
        .collect();
    fs::write(&path, body).expect("write record file");
    path
}
