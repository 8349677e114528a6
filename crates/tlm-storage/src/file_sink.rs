//! Log-file sink.
//!
//! Writes one display line per record into a buffered file. The buffer is
//! pushed to disk on every [`Sink::flush`], which the record store calls at
//! the end of each flush pass, and when the sink is dropped.
//!
//! A sink can be narrowed to one telemetry context, so a configuration can
//! route CPU records to `cpu.log`, RAM records to `ram.log`, and so on.
//!
//! # Example
//!
//! ```rust,ignore
//! use tlm_storage::FileSink;
//!
//! let cpu_log = FileSink::create("logs/cpu.log")?.with_context("CPU");
//! ```

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tlm_core::{Record, Sink, SinkError, TlmResult};

/// Sink that appends one display line per record to a file.
pub struct FileSink {
    name: String,
    path: PathBuf,
    context: Option<String>,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> TlmResult<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::from_file(path.as_ref(), file))
    }

    /// Open `path` for appending, creating it if missing.
    pub fn append<P: AsRef<Path>>(path: P) -> TlmResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::from_file(path.as_ref(), file))
    }

    fn from_file(path: &Path, file: File) -> Self {
        Self {
            name: format!("file:{}", path.display()),
            path: path.to_path_buf(),
            context: None,
            writer: Mutex::new(BufWriter::new(file)),
        }
    }

    /// Accept only records whose context matches (case-insensitive).
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Path the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Context filter, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn accepts(&self, record: &Record) -> bool {
        self.context
            .as_deref()
            .map_or(true, |c| c.eq_ignore_ascii_case(record.context()))
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, record: &Record) -> Result<(), SinkError> {
        if !self.accepts(record) {
            return Ok(());
        }
        writeln!(self.writer.lock(), "{record}")
            .map_err(|e| SinkError::write(&self.name, e.to_string()))
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| SinkError::flush(&self.name, e.to_string()))
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlm_core::Severity;

    fn record(context: &str, text: &str) -> Record {
        Record::new("app", "2024-01-01 00:00:00", context, Severity::Info, text)
    }

    #[test]
    fn test_writes_display_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.log");
        let sink = FileSink::create(&path).unwrap();

        sink.write(&record("CPU", "CPU usage: 10%")).unwrap();
        sink.write(&record("RAM", "RAM usage: 20%")).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "[2024-01-01 00:00:00] [INFO] app (CPU): CPU usage: 10%\n\
             [2024-01-01 00:00:00] [INFO] app (RAM): RAM usage: 20%\n"
        );
    }

    #[test]
    fn test_context_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu.log");
        let sink = FileSink::create(&path).unwrap().with_context("cpu");

        sink.write(&record("CPU", "kept")).unwrap();
        sink.write(&record("TEMP", "skipped")).unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("kept"));
        assert!(!contents.contains("skipped"));
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let sink = FileSink::append(&path).unwrap();
        sink.write(&record("CPU", "later")).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier\n"));
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with("(CPU): later\n"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.log");
        assert!(FileSink::create(path).is_err());
    }
}
