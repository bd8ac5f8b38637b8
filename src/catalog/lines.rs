//! Tab-separated record stream: `directory<TAB>filename[<TAB>payload]`.
//!
//! Matches what a catalog query exported as TSV looks like, so reports can be
//! produced from a dump or a pipe without a database connection.

use std::io::BufRead;

use crate::catalog::CatalogRecord;
use crate::core::errors::{BduError, Result};

/// Lazily parses records from a buffered reader, one per line.
pub struct LineSource<R> {
    reader: R,
    line_no: u64,
    buf: String,
}

impl<R: BufRead> LineSource<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    fn parse_line(&self, line: &str) -> Result<CatalogRecord> {
        let mut columns = line.splitn(3, '\t');
        let directory = columns.next().unwrap_or_default();
        let Some(filename) = columns.next() else {
            return Err(BduError::RecordSource {
                context: "tsv",
                details: format!(
                    "line {}: expected directory<TAB>filename[<TAB>payload], got {line:?}",
                    self.line_no
                ),
            });
        };
        let record = CatalogRecord::new(directory, filename);
        Ok(match columns.next().filter(|p| !p.is_empty()) {
            Some(payload) => record.with_payload(payload),
            None => record,
        })
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Result<CatalogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            self.line_no += 1;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(BduError::RecordSource {
                        context: "tsv",
                        details: format!("line {}: {source}", self.line_no),
                    }));
                }
            }
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse_line(line));
        }
    }
}
