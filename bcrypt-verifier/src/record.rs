use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;

/// Field separator for both the input list and the result file.
pub const DELIMITER: char = ',';

/// One `identifier,hash` pair from the input list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateRecord {
    identifier: String,
    stored_hash: String,
}

impl CandidateRecord {
    pub fn new(identifier: impl Into<String>, stored_hash: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), stored_hash: stored_hash.into() }
    }

    /// Splits a line into a record. Returns `None` unless the line holds
    /// exactly two delimiter-separated fields.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split(DELIMITER);
        let identifier = fields.next()?;
        let stored_hash = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(identifier, stored_hash))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn stored_hash(&self) -> &str {
        &self.stored_hash
    }
}

/// The password tested against every record of a run.
///
/// Cloning shares the same allocation, so every worker reads one immutable
/// value without locking.
#[derive(Clone, PartialEq, Eq)]
pub struct TargetPassword(Arc<str>);

impl TargetPassword {
    pub fn new(password: &str) -> Self {
        Self(Arc::from(password))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TargetPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TargetPassword(..)")
    }
}

/// A record whose stored hash verified against the target password.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRecord {
    pub identifier: String,
    pub password: String,
    pub stored_hash: String,
}

impl MatchRecord {
    pub fn new(record: &CandidateRecord, password: &TargetPassword) -> Self {
        Self {
            identifier: record.identifier.clone(),
            password: password.as_str().to_owned(),
            stored_hash: record.stored_hash.clone(),
        }
    }

    /// Renders the record as one complete output line, newline included.
    pub fn to_line(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}\n",
            self.identifier, self.password, self.stored_hash
        )
    }
}

/// Records accepted from an input source, plus the number of lines dropped
/// as malformed.
#[derive(Debug, Default, Clone)]
pub struct LoadedRecords {
    pub records: Vec<CandidateRecord>,
    pub skipped: u64,
}

impl LoadedRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads records line by line, stopping once `limit` records are accepted.
///
/// Lines are split on raw bytes. A line that is not valid UTF-8 or has the
/// wrong field count is dropped and never counts toward the limit. I/O errors
/// from the reader are returned.
pub fn load_records<R: BufRead>(mut reader: R, limit: Option<usize>) -> io::Result<LoadedRecords> {
    let mut loaded = LoadedRecords::default();
    let mut buf = Vec::new();
    let mut line_number = 0usize;

    loop {
        if limit.is_some_and(|max| loaded.records.len() >= max) {
            break;
        }
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;

        let line = trim_line_ending(&buf);
        let record = match std::str::from_utf8(line) {
            Ok(line) => CandidateRecord::parse_line(line),
            Err(e) => {
                debug!(line = line_number, error = %e, "skipping record that is not valid UTF-8");
                None
            }
        };
        match record {
            Some(record) => loaded.records.push(record),
            None => {
                debug!(line = line_number, "skipping malformed record");
                loaded.skipped += 1;
            }
        }
    }

    Ok(loaded)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Opens `path` and loads its records. Failing to open or read the file is
/// fatal for the run.
pub fn load_file(path: &Path, limit: Option<usize>) -> Result<LoadedRecords, Error> {
    let file =
        File::open(path).map_err(|source| Error::OpenInput { path: path.to_path_buf(), source })?;

    load_records(BufReader::new(file), limit)
        .map_err(|source| Error::ReadInput { path: path.to_path_buf(), source })
}
