//! The on-wire diagnostic log (spec.md §6 Filesystem, §9 Design Note 9).
//!
//! An append-only file of NUL-separated records, owned by a single `Logger`
//! value rather than process-wide global state. A record longer than
//! `MAX_RECORD_LEN` bytes is dropped, not truncated. A `record()` call made
//! from within another `record()` call is dropped, not queued — in this
//! crate that can only happen if a `Display` impl passed to `record()`
//! itself logs, which none of ours do, but the guard is kept for fidelity
//! and is exercised directly in tests.
//!
//! This is distinct from the operator-facing `tracing` output installed in
//! `main.rs`: that goes to stderr for a human; this goes to the file the
//! controller retrieves via `UNLOAD_LOGS`.

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::IoError;
use crate::io;

/// Maximum bytes a single formatted record may occupy, not counting the
/// trailing NUL separator appended on write.
const MAX_RECORD_LEN: usize = 350;

pub struct Logger {
    file: File,
    in_progress: Cell<bool>,
}

impl Logger {
    /// Opens (creating if necessary, truncating otherwise) the log file at
    /// `path` for append-only writes and random-access reads.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .append(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(IoError::Failed)?;
        Ok(Self {
            file,
            in_progress: Cell::new(false),
        })
    }

    /// Appends one record. Embedded newlines are rewritten to NUL bytes so
    /// they can't be mistaken for the record separator on read-back.
    pub fn record(&self, message: &str) {
        if self.in_progress.replace(true) {
            return;
        }
        let mut record = message.replace('\n', "\0");
        if record.as_bytes().len() <= MAX_RECORD_LEN {
            record.push('\0');
            let _ = (&self.file).write_all(record.as_bytes());
        }
        self.in_progress.set(false);
    }

    /// Returns the full contents of the log file, from the beginning.
    pub fn read_all(&self) -> Result<Vec<u8>, IoError> {
        (&self.file)
            .seek(SeekFrom::Start(0))
            .map_err(IoError::Failed)?;
        io::read_until_eof(&mut &self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_read_all_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        logger.record("hello");
        logger.record("world");
        let contents = logger.read_all().unwrap();
        assert_eq!(contents, b"hello\0world\0");
    }

    #[test]
    fn oversized_record_is_dropped_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        let huge = "x".repeat(MAX_RECORD_LEN + 1);
        logger.record(&huge);
        let contents = logger.read_all().unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn exact_max_length_record_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        let exact = "x".repeat(MAX_RECORD_LEN);
        logger.record(&exact);
        let contents = logger.read_all().unwrap();
        assert_eq!(contents.len(), MAX_RECORD_LEN + 1);
    }

    #[test]
    fn embedded_newline_becomes_nul() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        logger.record("line one\nline two");
        let contents = logger.read_all().unwrap();
        assert_eq!(contents, b"line one\0line two\0");
    }

    #[test]
    fn reentrant_record_call_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        // Simulate reentrancy directly: a nested call while the guard is
        // already held must be silently dropped, not queued.
        logger.in_progress.set(true);
        logger.record("should not appear");
        logger.in_progress.set(false);
        let contents = logger.read_all().unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn read_all_on_empty_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let logger = Logger::open(&path).unwrap();
        let contents = logger.read_all().unwrap();
        assert!(contents.is_empty());
    }
}
