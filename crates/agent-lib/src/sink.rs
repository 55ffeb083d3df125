//! Append-only structured log of sample records
//!
//! The log is a single JSON array written incrementally:
//!
//! ```text
//! [
//! {"timestamp":...,"os":{...},"runtime":{...}},
//! {"timestamp":...,"os":{...},"runtime":{...}}
//! ]
//! ```
//!
//! Every record is written and synced before `write` returns. A failed
//! append is rolled back to the end of the previous record, so the record
//! for that tick is dropped and the array stays well formed. The closing
//! bracket is written on `close`. If the process dies first, the file ends
//! without `]` and may carry one partial trailing record; readers should
//! treat such a tail as truncated, not corrupt.

use crate::error::{AgentError, Result};
use crate::models::SampleRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Destination for sample records
pub trait LogSink: Send {
    fn write(&mut self, record: &SampleRecord) -> Result<()>;

    /// Finish the log; further writes are errors
    fn close(&mut self) -> Result<()>;
}

/// Storage behind a [`JsonArraySink`]
pub trait LogFile: Write + Seek + Send {
    /// Cut the storage back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Make written bytes durable
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// JSON array file sink
pub struct JsonArraySink<F: LogFile = File> {
    path: PathBuf,
    file: Option<F>,
    /// End of the last complete append
    offset: u64,
    records: u64,
}

impl JsonArraySink<File> {
    /// Create or truncate `path` and write the opening bracket
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| AgentError::io(format!("opening {}", path.display()), e))?;

        Self::with_file(path, file)
    }
}

impl<F: LogFile> JsonArraySink<F> {
    /// Start a log on empty storage; `path` is used in error messages
    pub fn with_file(path: impl Into<PathBuf>, file: F) -> Result<Self> {
        let mut sink = Self {
            path: path.into(),
            file: Some(file),
            offset: 0,
            records: 0,
        };
        sink.append(b"[\n")?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Write `bytes` at the current end; on failure nothing is kept
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let context = || format!("writing {}", self.path.display());
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AgentError::io(context(), io::ErrorKind::BrokenPipe.into()))?;

        let written = file
            .write_all(bytes)
            .and_then(|()| file.flush())
            .and_then(|()| file.sync());

        match written {
            Ok(()) => {
                self.offset += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                let start = self.offset;
                let rollback = file
                    .truncate(start)
                    .and_then(|()| file.seek(SeekFrom::Start(start)).map(|_| ()));
                if let Err(rollback_err) = rollback {
                    // Contents past `offset` are unknown; stop writing
                    tracing::error!(
                        path = %self.path.display(),
                        error = %rollback_err,
                        "Failed to roll back sample log, closing it"
                    );
                    self.file = None;
                }
                Err(AgentError::io(context(), e))
            }
        }
    }
}

impl<F: LogFile> LogSink for JsonArraySink<F> {
    fn write(&mut self, record: &SampleRecord) -> Result<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| AgentError::io("serializing record", e.into()))?;

        let mut entry = Vec::with_capacity(json.len() + 2);
        if self.records > 0 {
            entry.extend_from_slice(b",\n");
        }
        entry.extend_from_slice(&json);

        self.append(&entry)?;
        self.records += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.append(b"\n]\n");
        self.file = None;
        result
    }
}

impl<F: LogFile> Drop for JsonArraySink<F> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close sample log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Snapshot;
    use parking_lot::Mutex;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(rss: u64) -> SampleRecord {
        SampleRecord {
            timestamp: 1_700_000_000_000 + rss,
            os: [("VmRSS", rss), ("overall", rss)].into_iter().collect(),
            runtime: [("heap_used", rss * 2)].into_iter().collect::<Snapshot>(),
        }
    }

    fn read_records(path: &Path) -> Vec<SampleRecord> {
        let text = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fault {
        None,
        /// Accept half of the next write, then fail
        PartialWrite,
        /// Accept the write but fail the sync
        Sync,
    }

    /// In-memory log storage with injectable faults
    #[derive(Clone)]
    struct FaultyFile {
        data: Arc<Mutex<Cursor<Vec<u8>>>>,
        fault: Arc<Mutex<Fault>>,
    }

    impl FaultyFile {
        fn new() -> Self {
            Self {
                data: Arc::new(Mutex::new(Cursor::new(Vec::new()))),
                fault: Arc::new(Mutex::new(Fault::None)),
            }
        }

        fn fail_next(&self, fault: Fault) {
            *self.fault.lock() = fault;
        }

        fn contents(&self) -> String {
            String::from_utf8(self.data.lock().get_ref().clone()).unwrap()
        }
    }

    impl Write for FaultyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut fault = self.fault.lock();
            if *fault == Fault::PartialWrite {
                *fault = Fault::None;
                self.data.lock().write_all(&buf[..buf.len() / 2])?;
                return Err(io::Error::other("no space left on device"));
            }
            self.data.lock().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FaultyFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.data.lock().seek(pos)
        }
    }

    impl LogFile for FaultyFile {
        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.data.lock().get_mut().truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            let mut fault = self.fault.lock();
            if *fault == Fault::Sync {
                *fault = Fault::None;
                return Err(io::Error::other("sync failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_empty_log_is_valid_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memlog.json");

        let mut sink = JsonArraySink::create(&path).unwrap();
        sink.close().unwrap();

        assert!(read_records(&path).is_empty());
    }

    #[test]
    fn test_records_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memlog.json");
        let written = vec![record(4096), record(8192), record(u64::MAX / 2)];

        let mut sink = JsonArraySink::create(&path).unwrap();
        for r in &written {
            sink.write(r).unwrap();
        }
        assert_eq!(sink.records(), 3);
        sink.close().unwrap();

        assert_eq!(read_records(&path), written);
    }

    #[test]
    fn test_each_write_is_on_disk_before_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memlog.json");

        let mut sink = JsonArraySink::create(&path).unwrap();
        sink.write(&record(1)).unwrap();

        // Unterminated array: close the bracket ourselves to parse it
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push(']');
        let parsed: Vec<SampleRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![record(1)]);
    }

    #[test]
    fn test_drop_closes_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memlog.json");

        {
            let mut sink = JsonArraySink::create(&path).unwrap();
            sink.write(&record(7)).unwrap();
        }

        assert_eq!(read_records(&path), vec![record(7)]);
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonArraySink::create(dir.path().join("memlog.json")).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert!(matches!(sink.write(&record(1)), Err(AgentError::Io { .. })));
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = JsonArraySink::create(dir.path().join("missing").join("memlog.json"));
        assert!(matches!(result, Err(AgentError::Io { .. })));
    }

    #[test]
    fn test_partial_write_is_dropped_and_log_stays_valid() {
        let file = FaultyFile::new();
        let mut sink = JsonArraySink::with_file("memory", file.clone()).unwrap();

        sink.write(&record(1)).unwrap();
        file.fail_next(Fault::PartialWrite);
        assert!(matches!(sink.write(&record(2)), Err(AgentError::Io { .. })));
        sink.write(&record(3)).unwrap();
        sink.close().unwrap();

        assert_eq!(sink.records(), 2);
        let parsed: Vec<SampleRecord> = serde_json::from_str(&file.contents()).unwrap();
        assert_eq!(parsed, vec![record(1), record(3)]);
    }

    #[test]
    fn test_failed_first_write_keeps_separator_state() {
        let file = FaultyFile::new();
        let mut sink = JsonArraySink::with_file("memory", file.clone()).unwrap();

        file.fail_next(Fault::Sync);
        assert!(sink.write(&record(1)).is_err());
        sink.write(&record(2)).unwrap();
        sink.close().unwrap();

        let parsed: Vec<SampleRecord> = serde_json::from_str(&file.contents()).unwrap();
        assert_eq!(parsed, vec![record(2)]);
    }

    #[test]
    fn test_failed_sync_is_not_retried() {
        let file = FaultyFile::new();
        let mut sink = JsonArraySink::with_file("memory", file.clone()).unwrap();

        sink.write(&record(1)).unwrap();
        file.fail_next(Fault::Sync);
        assert!(sink.write(&record(2)).is_err());
        assert!(!file.contents().contains("1700000000002"));

        sink.write(&record(3)).unwrap();
        sink.close().unwrap();

        let parsed: Vec<SampleRecord> = serde_json::from_str(&file.contents()).unwrap();
        assert_eq!(parsed, vec![record(1), record(3)]);
    }
}
