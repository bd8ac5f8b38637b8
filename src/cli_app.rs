//! Top-level CLI definition and dispatch.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use thiserror::Error;

use backup_du::catalog::lines::LineSource;
use backup_du::core::config::Config;
use backup_du::core::errors::BduError;
use backup_du::logger::jsonl::JsonlConfig;
use backup_du::logger::run_log::RunLog;
use backup_du::report::{Report, ReportOptions, RunSummary};

/// Disk usage and stat views over a backup catalog.
#[derive(Debug, Parser)]
#[command(
    name = "bdu",
    author,
    version,
    about = "du/stat over backup catalog records",
    long_about = None
)]
pub struct Cli {
    /// Report on this directory or file instead of the whole job.
    #[arg(value_name = "PATH")]
    path: Option<String>,
    /// SQLite catalog database.
    #[arg(long, value_name = "DB", conflicts_with = "input")]
    catalog: Option<PathBuf>,
    /// Tab-separated records (`dir<TAB>name<TAB>payload`); `-` reads stdin.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Backup job to report on.
    #[arg(short = 'j', long, value_name = "ID", conflicts_with = "client")]
    job: Option<u64>,
    /// Use the client's most recent successful backup job.
    #[arg(long, value_name = "NAME", conflicts_with = "input")]
    client: Option<String>,
    /// Measure recorded sizes instead of allocated blocks.
    #[arg(short = 'a', long)]
    apparent_size: bool,
    /// Count entries instead of measuring bytes.
    #[arg(short = 'c', long)]
    count: bool,
    /// Do not include subdirectory usage in parents.
    #[arg(short = 'S', long)]
    separate_dirs: bool,
    /// List files as well as directories.
    #[arg(long)]
    all: bool,
    /// Hide entries smaller than SIZE (e.g. 10M, 1Gi).
    #[arg(short = 't', long, value_name = "SIZE")]
    threshold: Option<String>,
    /// Print usage in units of SIZE.
    #[arg(short = 'B', long, value_name = "SIZE")]
    block_size: Option<String>,
    /// Only the N largest entries.
    #[arg(short = 'n', long, value_name = "N")]
    top: Option<usize>,
    /// stat(1)-style template, e.g. "%9s %n".
    #[arg(short = 'F', long, value_name = "TEMPLATE", conflicts_with = "md5sum")]
    format: Option<String>,
    /// Print md5sum-style digest lines instead of usage.
    #[arg(long)]
    md5sum: bool,
    /// Render times in UTC.
    #[arg(long)]
    utc: bool,
    /// Include entries the catalog marks as deleted.
    #[arg(long)]
    include_deleted: bool,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append a JSONL activity log to PATH.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Suppress warnings.
    #[arg(short, long)]
    quiet: bool,
    /// Print a shell completion script and exit.
    #[arg(long, value_name = "SHELL", value_enum)]
    completions: Option<CompletionShell>,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid flag combination or missing input.
    #[error("{0}")]
    User(String),
    #[error(transparent)]
    Engine(#[from] BduError),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Engine(e) if e.is_user_error() => 1,
            Self::Engine(_) | Self::Io(_) => 2,
        }
    }
}

enum Source {
    Lines(Box<dyn BufRead>),
    #[cfg(feature = "sqlite")]
    Sqlite {
        catalog: backup_du::catalog::sqlite::SqliteCatalog,
        query: backup_du::catalog::RecordQuery,
    },
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stderr().is_terminal() {
        control::set_override(false);
    }

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    apply_flags(&mut config, cli);
    config.validate()?;

    let options = ReportOptions::from_config(&config.report, cli.path.as_deref(), cli.utc)?;
    let mut report = Report::new(&options, cli.md5sum)?;

    let source = open_source(cli, &config)?;
    let job_id = match &source {
        Source::Lines(_) => cli.job,
        #[cfg(feature = "sqlite")]
        Source::Sqlite { query, .. } => Some(query.job_id),
    };

    let jsonl = cli
        .log
        .clone()
        .or_else(|| config.paths.jsonl_log.clone())
        .map(|path| JsonlConfig::at(path).with_fallback(config.paths.jsonl_fallback.clone()));
    let mut log = RunLog::open(jsonl, cli.quiet)
        .with_job(job_id)
        .with_config_hash(config.stable_hash()?);
    log.run_started(format!(
        "mode={} root={}",
        if cli.md5sum { "md5sum" } else { "usage" },
        cli.path.as_deref().unwrap_or("/")
    ));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let outcome = drive(source, &mut report, &mut out, &mut log)
        .and_then(|()| report.finish(&mut out));

    match outcome {
        Ok(summary) => {
            log.run_completed(summary.records, summary.entries, summary_details(&summary));
            Ok(())
        }
        Err(err) => {
            log.failed(&err);
            Err(err.into())
        }
    }
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    let report = &mut config.report;
    report.apparent_size |= cli.apparent_size;
    report.count |= cli.count;
    report.separate_dirs |= cli.separate_dirs;
    report.all_files |= cli.all;
    if let Some(threshold) = &cli.threshold {
        report.threshold.clone_from(threshold);
    }
    if let Some(block_size) = &cli.block_size {
        report.block_size.clone_from(block_size);
    }
    if cli.top.is_some() {
        report.top = cli.top;
    }
    if cli.format.is_some() {
        report.format.clone_from(&cli.format);
    }
    if cli.md5sum {
        report.format = None;
    }
    config.catalog.include_deleted |= cli.include_deleted;
    if let Some(catalog) = &cli.catalog {
        config.catalog.database = Some(catalog.clone());
    }
}

fn open_source(cli: &Cli, config: &Config) -> Result<Source, CliError> {
    if let Some(input) = &cli.input {
        let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(input).map_err(|source| BduError::io(input, source))?;
            Box::new(BufReader::new(file))
        };
        return Ok(Source::Lines(reader));
    }

    let Some(database) = &config.catalog.database else {
        return Err(CliError::User(
            "no record source: pass --input FILE or --catalog DB (or set catalog.database)"
                .to_string(),
        ));
    };
    open_catalog(cli, config, database)
}

#[cfg(feature = "sqlite")]
fn open_catalog(cli: &Cli, config: &Config, database: &Path) -> Result<Source, CliError> {
    use backup_du::catalog::sqlite::SqliteCatalog;
    use backup_du::catalog::{PayloadKind, RecordQuery};

    let catalog = SqliteCatalog::open(database)?;
    let job_id = match (cli.job, &cli.client) {
        (Some(job_id), _) => job_id,
        (None, Some(client)) => catalog.latest_job_for_client(client)?.ok_or_else(|| {
            CliError::User(format!("no successful backup job found for client {client:?}"))
        })?,
        (None, None) => {
            return Err(CliError::User(
                "a catalog needs --job ID or --client NAME".to_string(),
            ));
        }
    };
    let payload = if cli.md5sum {
        PayloadKind::Digest
    } else {
        PayloadKind::LStat
    };
    let query = RecordQuery::for_job(job_id)
        .with_prefix(query_prefix(cli.path.as_deref()))
        .with_payload(payload)
        .with_deleted(config.catalog.include_deleted);
    Ok(Source::Sqlite { catalog, query })
}

#[cfg(not(feature = "sqlite"))]
fn open_catalog(_cli: &Cli, _config: &Config, database: &Path) -> Result<Source, CliError> {
    Err(CliError::User(format!(
        "cannot read {}: bdu was built without the sqlite feature",
        database.display()
    )))
}

/// Directory prefix that covers the target whether it names a directory or a
/// file: its parent, with a trailing slash.
#[cfg(feature = "sqlite")]
fn query_prefix(target: Option<&str>) -> Option<String> {
    use backup_du::usage::aggregator::{normalize_root, parent_path};

    let root = normalize_root(target?);
    let parent = parent_path(&root)?;
    if parent.ends_with('/') {
        Some(parent.to_string())
    } else {
        Some(format!("{parent}/"))
    }
}

fn drive<W: Write>(
    source: Source,
    report: &mut Report,
    out: &mut W,
    log: &mut RunLog,
) -> backup_du::core::errors::Result<()> {
    match source {
        Source::Lines(reader) => {
            for record in LineSource::new(reader) {
                report.accept(&record?, out, log)?;
            }
            Ok(())
        }
        #[cfg(feature = "sqlite")]
        Source::Sqlite { catalog, query } => catalog
            .for_each_record(&query, |record| report.accept(&record, out, log))
            .map(|_| ()),
    }
}

fn summary_details(summary: &RunSummary) -> Option<String> {
    serde_json::to_string(summary).ok()
}
