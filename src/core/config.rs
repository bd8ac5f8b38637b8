//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BduError, Result};
use crate::core::units::parse_size;

/// Full bdu configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub report: ReportConfig,
    pub catalog: CatalogConfig,
    pub paths: PathsConfig,
}

/// How usage is measured, filtered, and printed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Minimum accumulated value an entry needs to be printed (size string).
    pub threshold: String,
    /// Unit for printed usage counts (size string).
    pub block_size: String,
    /// Measure the recorded size field instead of allocated blocks.
    pub apparent_size: bool,
    /// Count entries instead of measuring bytes.
    pub count: bool,
    /// Do not roll subdirectory usage up into parents.
    pub separate_dirs: bool,
    /// Emit individual files as well as directories.
    pub all_files: bool,
    /// Keep only the N largest entries.
    pub top: Option<usize>,
    /// stat(1)-style template used instead of the summary line.
    pub format: Option<String>,
    /// Abort when a digest carries non-zero padding bits; otherwise warn.
    pub strict_digest_padding: bool,
}

/// Where catalog records come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite catalog database.
    pub database: Option<PathBuf>,
    /// Also report entries the catalog marks as deleted.
    pub include_deleted: bool,
}

/// Filesystem paths used by bdu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Optional JSONL activity log; disabled when unset.
    pub jsonl_log: Option<PathBuf>,
    /// Where the activity log goes when `jsonl_log` cannot be opened.
    pub jsonl_fallback: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            threshold: "1".to_string(),
            block_size: "1Ki".to_string(),
            apparent_size: false,
            count: false,
            separate_dirs: false,
            all_files: false,
            top: None,
            format: None,
            strict_digest_padding: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let config_dir = env::var_os("XDG_CONFIG_HOME").map_or_else(
            || {
                env::var_os("HOME")
                    .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
                    .join(".config")
            },
            PathBuf::from,
        );
        Self {
            config_file: config_dir.join("bdu").join("config.toml"),
            jsonl_log: None,
            jsonl_fallback: None,
        }
    }
}

impl ReportConfig {
    /// Threshold in bytes (or entries, in count mode).
    pub fn threshold_bytes(&self) -> Result<u64> {
        parse_size(&self.threshold)
    }

    /// Block size in bytes.
    pub fn block_size_bytes(&self) -> Result<u64> {
        parse_size(&self.block_size)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BduError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(BduError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // report
        if let Some(raw) = lookup("BDU_REPORT_THRESHOLD") {
            self.report.threshold = raw;
        }
        if let Some(raw) = lookup("BDU_REPORT_BLOCK_SIZE") {
            self.report.block_size = raw;
        }
        set_bool(
            &mut lookup,
            "BDU_REPORT_APPARENT_SIZE",
            &mut self.report.apparent_size,
        )?;
        set_bool(&mut lookup, "BDU_REPORT_COUNT", &mut self.report.count)?;
        set_bool(
            &mut lookup,
            "BDU_REPORT_SEPARATE_DIRS",
            &mut self.report.separate_dirs,
        )?;
        set_bool(&mut lookup, "BDU_REPORT_ALL_FILES", &mut self.report.all_files)?;
        if let Some(raw) = lookup("BDU_REPORT_TOP") {
            let top = raw.parse::<usize>().map_err(|error| BduError::ConfigParse {
                context: "env",
                details: format!("BDU_REPORT_TOP={raw:?}: {error}"),
            })?;
            self.report.top = Some(top);
        }
        if let Some(raw) = lookup("BDU_REPORT_FORMAT") {
            self.report.format = Some(raw);
        }
        set_bool(
            &mut lookup,
            "BDU_REPORT_STRICT_DIGEST_PADDING",
            &mut self.report.strict_digest_padding,
        )?;

        // catalog
        if let Some(raw) = lookup("BDU_CATALOG_DATABASE") {
            self.catalog.database = Some(PathBuf::from(raw));
        }
        set_bool(
            &mut lookup,
            "BDU_CATALOG_INCLUDE_DELETED",
            &mut self.catalog.include_deleted,
        )?;

        // paths
        if let Some(raw) = lookup("BDU_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("BDU_PATHS_JSONL_FALLBACK") {
            self.paths.jsonl_fallback = Some(PathBuf::from(raw));
        }

        Ok(())
    }

    /// Check cross-field constraints; size strings must parse.
    pub fn validate(&self) -> Result<()> {
        self.report.threshold_bytes()?;
        let block_size = self.report.block_size_bytes()?;
        if block_size == 0 {
            return Err(BduError::InvalidConfig {
                details: "report.block_size must be > 0".to_string(),
            });
        }

        if self.report.top == Some(0) {
            return Err(BduError::InvalidConfig {
                details: "report.top must be >= 1 when set".to_string(),
            });
        }

        if self.report.count && self.report.apparent_size {
            return Err(BduError::InvalidConfig {
                details: "report.count and report.apparent_size are mutually exclusive"
                    .to_string(),
            });
        }

        if let Some(db) = &self.catalog.database
            && db.as_os_str().is_empty()
        {
            return Err(BduError::InvalidConfig {
                details: "catalog.database must not be empty when set".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| BduError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{BduError, Config};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.report.threshold_bytes().unwrap(), 1);
        assert_eq!(cfg.report.block_size_bytes().unwrap(), 1024);
        assert!(cfg.report.strict_digest_padding);
    }

    #[test]
    fn zero_block_size_rejected() {
        let mut cfg = Config::default();
        cfg.report.block_size = "0".to_string();
        let err = cfg.validate().expect_err("expected invalid block size");
        match err {
            BduError::InvalidConfig { details } => assert!(details.contains("block_size")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_threshold_rejected() {
        let mut cfg = Config::default();
        cfg.report.threshold = "lots".to_string();
        let err = cfg.validate().expect_err("expected unit error");
        assert_eq!(err.code(), "BDU-1101");
    }

    #[test]
    fn zero_top_rejected() {
        let mut cfg = Config::default();
        cfg.report.top = Some(0);
        assert!(cfg.validate().is_err());
        cfg.report.top = Some(3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn count_and_apparent_size_conflict() {
        let mut cfg = Config::default();
        cfg.report.count = true;
        cfg.report.apparent_size = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("BDU_REPORT_THRESHOLD", "10Ki"),
            ("BDU_REPORT_BLOCK_SIZE", "1"),
            ("BDU_REPORT_SEPARATE_DIRS", "true"),
            ("BDU_REPORT_TOP", "5"),
            ("BDU_CATALOG_DATABASE", "/var/lib/bacula/bacula.db"),
            ("BDU_PATHS_JSONL_LOG", "/tmp/bdu.jsonl"),
            ("BDU_PATHS_JSONL_FALLBACK", "/var/tmp/bdu.jsonl"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides apply");

        assert_eq!(cfg.report.threshold_bytes().unwrap(), 10_240);
        assert_eq!(cfg.report.block_size_bytes().unwrap(), 1);
        assert!(cfg.report.separate_dirs);
        assert_eq!(cfg.report.top, Some(5));
        assert_eq!(
            cfg.catalog.database,
            Some(PathBuf::from("/var/lib/bacula/bacula.db"))
        );
        assert_eq!(cfg.paths.jsonl_log, Some(PathBuf::from("/tmp/bdu.jsonl")));
        assert_eq!(
            cfg.paths.jsonl_fallback,
            Some(PathBuf::from("/var/tmp/bdu.jsonl"))
        );
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let env = vars(&[("BDU_REPORT_COUNT", "yes please")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("expected parse failure");
        assert_eq!(err.code(), "BDU-1003");
        assert!(err.to_string().contains("BDU_REPORT_COUNT"));
    }

    #[test]
    fn toml_sections_parse_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [report]
            block_size = "1Mi"
            all_files = true
            format = "%9s %n\n"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.report.block_size_bytes().unwrap(), 1_048_576);
        assert!(cfg.report.all_files);
        assert_eq!(cfg.report.threshold, "1");
        assert_eq!(cfg.report.format.as_deref(), Some("%9s %n\n"));
        assert!(cfg.catalog.database.is_none());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bdu.toml");
        std::fs::write(&path, "[report]\nthreshold = \"5M\"\n").unwrap();
        let cfg = Config::load(Some(&path)).expect("load");
        assert_eq!(cfg.paths.config_file, path);
        assert_eq!(cfg.report.threshold_bytes().unwrap(), 5_000_000);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/bdu/config.toml")));
        let err = result.unwrap_err();
        assert!(matches!(err, BduError::MissingConfig { .. }));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash");
        let mut changed = cfg.clone();
        changed.report.count = true;
        assert_ne!(before, changed.stable_hash().expect("hash"));
        assert_eq!(before, cfg.stable_hash().expect("hash"));
    }
}
