//! Read-only access to a Bacula-style SQLite catalog.
//!
//! Only the tables the report needs are touched: `Client`, `Job`, `Path` and
//! `File`. The connection is opened read-only; nothing here writes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params_from_iter, types::Value};

use crate::catalog::{CatalogRecord, PayloadKind, RecordQuery};
use crate::core::errors::{BduError, Result};

/// Backup job types and statuses that count as a usable full record set.
const BACKUP_JOB_TYPE: &str = "B";
const OK_JOB_STATUSES: &str = "'T','W'";

pub struct SqliteCatalog {
    conn: Connection,
    path: PathBuf,
}

impl SqliteCatalog {
    /// Open an existing catalog database without write access.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BduError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "catalog database not found"),
            ));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Newest successful backup job for a client, by start time.
    pub fn latest_job_for_client(&self, client: &str) -> Result<Option<u64>> {
        let sql = format!(
            "SELECT Job.JobId FROM Job
             JOIN Client ON Client.ClientId = Job.ClientId
             WHERE Client.Name = ?1 AND Job.Type = ?2 AND Job.JobStatus IN ({OK_JOB_STATUSES})
             ORDER BY Job.StartTime DESC, Job.JobId DESC
             LIMIT 1"
        );
        let job_id: Option<i64> = self
            .conn
            .query_row(&sql, [client, BACKUP_JOB_TYPE], |row| row.get(0))
            .optional()?;
        job_id
            .map(|id| {
                u64::try_from(id).map_err(|_| BduError::RecordSource {
                    context: "sqlite",
                    details: format!("negative JobId {id} for client {client:?}"),
                })
            })
            .transpose()
    }

    /// Stream every record of a job to `sink`, stopping at the first error
    /// either side returns.
    pub fn for_each_record<F>(&self, query: &RecordQuery, mut sink: F) -> Result<u64>
    where
        F: FnMut(CatalogRecord) -> Result<()>,
    {
        let job_id = i64::try_from(query.job_id).map_err(|_| BduError::RecordSource {
            context: "sqlite",
            details: format!("job id {} out of range", query.job_id),
        })?;

        let payload_column = match query.payload {
            PayloadKind::LStat => "File.LStat",
            PayloadKind::Digest => "File.MD5",
        };
        let mut sql = format!(
            "SELECT Path.Path, File.Filename, {payload_column}
             FROM File JOIN Path ON Path.PathId = File.PathId
             WHERE File.JobId = ?"
        );
        let mut args: Vec<Value> = vec![Value::Integer(job_id)];
        if let Some(prefix) = query.path_prefix.as_deref().filter(|p| !p.is_empty()) {
            sql.push_str(" AND Path.Path LIKE ? ESCAPE '\\'");
            args.push(Value::Text(format!("{}%", escape_like(prefix))));
        }
        if !query.include_deleted {
            sql.push_str(" AND File.FileIndex > 0");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;
        let mut delivered = 0_u64;
        while let Some(row) = rows.next()? {
            let directory: String = row.get(0)?;
            let filename: Option<String> = row.get(1)?;
            let payload: Option<String> = row.get(2)?;
            let record = CatalogRecord::new(directory, filename.unwrap_or_default());
            let record = match payload.filter(|p| !p.is_empty()) {
                Some(payload) => record.with_payload(payload),
                None => record,
            };
            sink(record)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
