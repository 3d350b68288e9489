//! Serialized writer for match records.
//!
//! The lock covers exactly one line write. A failed write is logged and
//! counted, and the caller carries on. After [`ResultSink::close`] further
//! records are dropped, so a late worker can never append half a line to a
//! file that is being released.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::record::MatchRecord;

pub struct ResultSink<W: Write> {
    writer: Mutex<Option<W>>,
    written: AtomicU64,
    failed: AtomicU64,
}

impl ResultSink<BufWriter<File>> {
    /// Creates (or truncates) the result file at `path`.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = File::create(path)
            .map_err(|source| Error::CreateOutput { path: path.to_path_buf(), source })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Appends one match as a single line and flushes it.
    ///
    /// Returns `true` if the line reached the writer.
    pub fn record(&self, m: &MatchRecord) -> bool {
        info!(
            "Verification succeeded: {} {} --> {}",
            m.identifier, m.password, m.stored_hash
        );
        // Format before locking; the critical section is the write alone.
        let line = m.to_line();

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(writer) = guard.as_mut() else {
            debug!(identifier = %m.identifier, "result sink closed, dropping match");
            self.failed.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match write_line(writer, line.as_bytes()) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(identifier = %m.identifier, error = %e, "failed to write match");
                self.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Flushes and releases the writer. Waits for any write in progress.
    ///
    /// Returns the writer the first time; later calls return `None`.
    pub fn close(&self) -> Option<W> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        if let Err(e) = writer.flush() {
            warn!(error = %e, "failed to flush result file");
        }
        Some(writer)
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Matches successfully written.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Matches lost to write errors or to a closed sink.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::record::{CandidateRecord, TargetPassword};

    fn sample(id: &str) -> MatchRecord {
        MatchRecord::new(&CandidateRecord::new(id, "$2b$04$hash"), &TargetPassword::new("pw"))
    }

    /// Accepts a limited number of writes, then fails every call.
    struct FlakyWriter {
        budget: usize,
        out: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.budget -= 1;
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_record_writes_line() {
        let sink = ResultSink::new(Vec::new());
        assert!(sink.record(&sample("alice")));
        assert!(sink.record(&sample("bob")));

        let out = String::from_utf8(sink.close().unwrap()).unwrap();
        assert_eq!(out, "alice,pw,$2b$04$hash\nbob,pw,$2b$04$hash\n");
        assert_eq!(sink.written(), 2);
        assert_eq!(sink.failed(), 0);
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let sink = ResultSink::new(FlakyWriter { budget: 1, out: Vec::new() });
        assert!(sink.record(&sample("first")));
        assert!(!sink.record(&sample("second")));
        assert!(!sink.record(&sample("third")));

        assert_eq!(sink.written(), 1);
        assert_eq!(sink.failed(), 2);
        let writer = sink.close().unwrap();
        assert_eq!(writer.out, b"first,pw,$2b$04$hash\n");
    }

    #[test]
    fn test_record_after_close_is_dropped() {
        let sink = ResultSink::new(Vec::new());
        assert!(sink.close().is_some());
        assert!(sink.is_closed());
        assert!(!sink.record(&sample("late")));
        assert!(sink.close().is_none());
        assert_eq!(sink.failed(), 1);
    }

    #[test]
    fn test_concurrent_records_never_interleave() {
        let sink = Arc::new(ResultSink::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..200 {
                        sink.record(&sample(&format!("worker{t}-record{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let out = String::from_utf8(sink.close().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1600);
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 3, "malformed line: {line}");
            assert!(fields[0].starts_with("worker"));
            assert_eq!(fields[1], "pw");
            assert_eq!(fields[2], "$2b$04$hash");
        }
    }
}
