//! Hierarchical usage accumulation over a tree implied by path strings.
//!
//! Directories are never materialized: a directory exists because some key
//! has it as a prefix. Each record credits its directory and, unless
//! directories are kept separate, every ancestor up to the root.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::decode::lstat::FileStat;

static DRIVE_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:/$").expect("drive root pattern is valid"));
static DRIVE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:$").expect("drive letter pattern is valid"));

/// What one record contributes to every key it credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Allocated bytes: `blocks × 512`.
    Blocks,
    /// The recorded `size` field.
    ApparentSize,
    /// One per record.
    Count,
}

impl Metric {
    #[must_use]
    pub const fn from_flags(apparent_size: bool, count: bool) -> Self {
        if count {
            Self::Count
        } else if apparent_size {
            Self::ApparentSize
        } else {
            Self::Blocks
        }
    }

    /// Whether measuring needs a decoded lstat.
    #[must_use]
    pub const fn needs_stat(self) -> bool {
        !matches!(self, Self::Count)
    }

    #[must_use]
    pub fn measure(self, stat: Option<&FileStat>) -> u64 {
        match (self, stat) {
            (Self::Count, _) => 1,
            (Self::Blocks, Some(stat)) => stat.block_bytes(),
            (Self::ApparentSize, Some(stat)) => stat.apparent_size(),
            (_, None) => 0,
        }
    }
}

/// `X:/`: a terminal directory like `/`.
#[must_use]
pub fn is_drive_root(path: &str) -> bool {
    DRIVE_ROOT.is_match(path)
}

/// Strip one trailing slash, except from `/` and drive roots.
#[must_use]
pub fn normalize_dir(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() && !is_drive_root(path) => stripped,
        _ => path,
    }
}

/// Normalize a user-supplied target path into a rollup root.
#[must_use]
pub fn normalize_root(target: &str) -> String {
    let trimmed = target.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if DRIVE_LETTER.is_match(trimmed) {
        format!("{trimmed}/")
    } else {
        trimmed.to_string()
    }
}

/// Join a normalized directory and a file name; an empty name is the
/// directory's own entry.
#[must_use]
pub fn join_path(directory: &str, filename: &str) -> String {
    if filename.is_empty() {
        directory.to_string()
    } else if directory.ends_with('/') {
        format!("{directory}{filename}")
    } else {
        format!("{directory}/{filename}")
    }
}

/// Parent of a normalized path, or `None` at `/`, a drive root, or a bare name.
#[must_use]
pub fn parent_path(path: &str) -> Option<&str> {
    let slash = path.rfind('/')?;
    let parent = normalize_dir(&path[..=slash]);
    (parent != path).then_some(parent)
}

/// Which part of the catalog a run reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootScope {
    root: String,
    restricted: bool,
}

impl Default for RootScope {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            restricted: false,
        }
    }
}

impl RootScope {
    /// Scope limited to `target`, or the whole catalog when `None`.
    #[must_use]
    pub fn new(target: Option<&str>) -> Self {
        target.map_or_else(Self::default, |target| Self {
            root: normalize_root(target),
            restricted: true,
        })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether a normalized directory lies at or below the root.
    #[must_use]
    pub fn covers_dir(&self, directory: &str) -> bool {
        if !self.restricted {
            return true;
        }
        if self.root.ends_with('/') {
            return directory.starts_with(&self.root);
        }
        directory
            .strip_prefix(&self.root)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Whether the record is the target itself when the target names a file.
    #[must_use]
    pub fn is_target_file(&self, directory: &str, filename: &str) -> bool {
        self.restricted && !filename.is_empty() && join_path(directory, filename) == self.root
    }

    /// Whether a raw catalog record should be looked at at all.
    #[must_use]
    pub fn accepts(&self, directory: &str, filename: &str) -> bool {
        let directory = normalize_dir(directory);
        self.covers_dir(directory) || self.is_target_file(directory, filename)
    }
}

/// Options fixed for one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    pub target: Option<String>,
    pub separate_dirs: bool,
    pub include_files: bool,
}

/// Path → accumulated metric, built in one pass over the records.
#[derive(Debug)]
pub struct PathAggregator {
    usage: HashMap<String, u64>,
    metric: Metric,
    scope: RootScope,
    separate_dirs: bool,
    include_files: bool,
}

impl PathAggregator {
    pub fn new(metric: Metric, options: &AggregatorOptions) -> Self {
        Self {
            usage: HashMap::new(),
            metric,
            scope: RootScope::new(options.target.as_deref()),
            separate_dirs: options.separate_dirs,
            include_files: options.include_files,
        }
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub const fn scope(&self) -> &RootScope {
        &self.scope
    }

    /// Whether individual files get keys of their own.
    #[must_use]
    pub const fn include_files(&self) -> bool {
        self.include_files
    }

    /// Credit one record. Returns `false` when it falls outside the scope.
    pub fn record(&mut self, directory: &str, filename: &str, stat: Option<&FileStat>) -> bool {
        let directory = normalize_dir(directory);
        let amount = self.metric.measure(stat);

        if !self.scope.covers_dir(directory) {
            if self.scope.is_target_file(directory, filename) {
                let root = self.scope.root.clone();
                self.credit(&root, amount);
                return true;
            }
            return false;
        }

        if self.include_files && !filename.is_empty() {
            self.credit(&join_path(directory, filename), amount);
        }
        self.credit(directory, amount);

        if !self.separate_dirs {
            let mut current = directory;
            while current != self.scope.root && !is_drive_root(current) {
                let Some(parent) = parent_path(current) else {
                    break;
                };
                self.credit(parent, amount);
                current = parent;
            }
        }
        true
    }

    fn credit(&mut self, key: &str, amount: u64) {
        if let Some(total) = self.usage.get_mut(key) {
            *total = total.saturating_add(amount);
        } else {
            self.usage.insert(key.to_string(), amount);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.usage.get(key).copied()
    }

    #[must_use]
    pub const fn usage(&self) -> &HashMap<String, u64> {
        &self.usage
    }

    #[must_use]
    pub fn into_usage(self) -> HashMap<String, u64> {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;

    fn sized(size: u64) -> FileStat {
        FileStat {
            size,
            blocks: size.div_ceil(512),
            ..FileStat::default()
        }
    }

    fn apparent(options: &AggregatorOptions) -> PathAggregator {
        PathAggregator::new(Metric::ApparentSize, options)
    }

    #[test]
    fn path_helpers() {
        assert_eq!(normalize_dir("/a/b/"), "/a/b");
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_dir("C:/"), "C:/");
        assert_eq!(normalize_dir("C:/Users/"), "C:/Users");
        assert_eq!(normalize_root("/a/b//"), "/a/b");
        assert_eq!(normalize_root("///"), "/");
        assert_eq!(normalize_root("D:"), "D:/");
        assert_eq!(join_path("/", "etc"), "/etc");
        assert_eq!(join_path("/a", "f"), "/a/f");
        assert_eq!(join_path("/a", ""), "/a");
        assert_eq!(parent_path("/a/b"), Some("/a"));
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("C:/Users"), Some("C:/"));
        assert_eq!(parent_path("C:/"), None);
        assert_eq!(parent_path("relative"), None);
    }

    #[test]
    fn rollup_example() {
        let mut agg = apparent(&AggregatorOptions::default());
        agg.record("/a/b/", "file1", Some(&sized(100)));
        agg.record("/a/c/", "file2", Some(&sized(200)));

        assert_eq!(agg.get("/a"), Some(300));
        assert_eq!(agg.get("/a/b"), Some(100));
        assert_eq!(agg.get("/a/c"), Some(200));
        assert_eq!(agg.get("/"), Some(300));
        assert_eq!(agg.get("/a/b/file1"), None);
        assert_eq!(agg.usage().len(), 4);
    }

    #[test]
    fn include_files_adds_file_keys() {
        let mut agg = apparent(&AggregatorOptions {
            include_files: true,
            ..AggregatorOptions::default()
        });
        agg.record("/a/b/", "file1", Some(&sized(100)));
        agg.record("/a/c/", "file2", Some(&sized(200)));
        assert_eq!(agg.get("/a/b/file1"), Some(100));
        assert_eq!(agg.get("/a/c/file2"), Some(200));
        assert_eq!(agg.get("/a"), Some(300));
    }

    #[test]
    fn directory_own_entry_is_credited_once() {
        let mut agg = apparent(&AggregatorOptions {
            include_files: true,
            ..AggregatorOptions::default()
        });
        agg.record("/a/", "", Some(&sized(4096)));
        assert_eq!(agg.get("/a"), Some(4096));
        assert_eq!(agg.get("/"), Some(4096));
    }

    #[test]
    fn separate_dirs_skips_rollup() {
        let mut agg = apparent(&AggregatorOptions {
            separate_dirs: true,
            ..AggregatorOptions::default()
        });
        agg.record("/a/b/", "file1", Some(&sized(100)));
        agg.record("/a/", "file0", Some(&sized(7)));
        assert_eq!(agg.get("/a/b"), Some(100));
        assert_eq!(agg.get("/a"), Some(7));
        assert_eq!(agg.get("/"), None);
    }

    #[test]
    fn target_root_stops_rollup_and_filters() {
        let mut agg = apparent(&AggregatorOptions {
            target: Some("/a/".to_string()),
            ..AggregatorOptions::default()
        });
        assert!(agg.record("/a/b/", "file1", Some(&sized(100))));
        assert!(!agg.record("/ab/", "file9", Some(&sized(999))));
        assert!(!agg.record("/z/", "file3", Some(&sized(5))));

        assert_eq!(agg.get("/a"), Some(100));
        assert_eq!(agg.get("/"), None);
        assert_eq!(agg.get("/ab"), None);
        assert!(!agg.scope().accepts("/ab/", "file9"));
        assert!(agg.scope().accepts("/a/", "x"));
    }

    #[test]
    fn target_naming_a_file_credits_only_that_file() {
        let mut agg = apparent(&AggregatorOptions {
            target: Some("/a/b/file1".to_string()),
            separate_dirs: true,
            ..AggregatorOptions::default()
        });
        assert!(agg.scope().accepts("/a/b/", "file1"));
        assert!(!agg.scope().accepts("/a/b/", "file2"));
        assert!(agg.record("/a/b/", "file1", Some(&sized(100))));
        assert!(!agg.record("/a/b/", "file2", Some(&sized(1))));
        assert_eq!(agg.get("/a/b/file1"), Some(100));
        assert_eq!(agg.usage().len(), 1);
    }

    #[test]
    fn drive_roots_terminate_rollup() {
        let mut agg = apparent(&AggregatorOptions::default());
        agg.record("C:/Users/me/", "ntuser.dat", Some(&sized(50)));
        assert_eq!(agg.get("C:/Users/me"), Some(50));
        assert_eq!(agg.get("C:/Users"), Some(50));
        assert_eq!(agg.get("C:/"), Some(50));
        assert_eq!(agg.get("/"), None);
    }

    #[test]
    fn metrics_measure_differently() {
        let stat = FileStat {
            size: 10,
            blocks: 8,
            ..FileStat::default()
        };
        assert_eq!(Metric::Blocks.measure(Some(&stat)), 4096);
        assert_eq!(Metric::ApparentSize.measure(Some(&stat)), 10);
        assert_eq!(Metric::Count.measure(None), 1);
        assert_eq!(Metric::from_flags(true, false), Metric::ApparentSize);
        assert_eq!(Metric::from_flags(true, true), Metric::Count);
        assert_eq!(Metric::from_flags(false, false), Metric::Blocks);
    }

    #[test]
    fn shuffled_delivery_gives_identical_totals() {
        let records: Vec<(String, String, u64)> = (0..200u64)
            .map(|i| {
                (
                    format!("/srv/d{}/s{}/", i % 7, i % 3),
                    format!("f{i}"),
                    i * 13 + 1,
                )
            })
            .collect();
        let options = AggregatorOptions {
            include_files: true,
            ..AggregatorOptions::default()
        };

        let mut ordered = apparent(&options);
        for (dir, name, size) in &records {
            ordered.record(dir, name, Some(&sized(*size)));
        }

        let mut shuffled_records = records.clone();
        shuffled_records.shuffle(&mut rand::rng());
        let mut shuffled = apparent(&options);
        for (dir, name, size) in &shuffled_records {
            shuffled.record(dir, name, Some(&sized(*size)));
        }

        assert_eq!(ordered.into_usage(), shuffled.into_usage());
    }

    fn arb_records() -> impl Strategy<Value = Vec<(String, u64)>> {
        let dir = prop::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 0..4)
            .prop_map(|parts| {
                let mut dir = String::from("/");
                for part in parts {
                    dir.push_str(part);
                    dir.push('/');
                }
                dir
            });
        prop::collection::vec((dir, 0u64..1_000_000), 0..40)
    }

    proptest! {
        #[test]
        fn root_total_is_sum_of_contributions(
            records in arb_records(),
            metric in prop_oneof![Just(Metric::Blocks), Just(Metric::ApparentSize), Just(Metric::Count)],
        ) {
            let mut agg = PathAggregator::new(metric, &AggregatorOptions::default());
            let mut expected = 0u64;
            for (index, (dir, size)) in records.iter().enumerate() {
                let stat = sized(*size);
                expected += metric.measure(Some(&stat));
                agg.record(dir, &format!("f{index}"), Some(&stat));
            }
            let root_total = agg.get("/").unwrap_or(0);
            prop_assert_eq!(root_total, expected);
        }

        #[test]
        fn totals_do_not_depend_on_order(records in arb_records()) {
            let options = AggregatorOptions { include_files: true, ..AggregatorOptions::default() };
            let mut forward = apparent(&options);
            let mut backward = apparent(&options);
            for (index, (dir, size)) in records.iter().enumerate() {
                forward.record(dir, &format!("f{index}"), Some(&sized(*size)));
            }
            for (index, (dir, size)) in records.iter().enumerate().rev() {
                backward.record(dir, &format!("f{index}"), Some(&sized(*size)));
            }
            prop_assert_eq!(forward.into_usage(), backward.into_usage());
        }
    }
}
