//! In-memory sink for tests and inspection.

use parking_lot::Mutex;
use tlm_core::{Record, Sink, SinkError};

/// Collects every delivered record in memory.
///
/// [`MemorySink::failing`] builds a sink whose writes always fail, for
/// exercising failure isolation.
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    records: Mutex<Vec<Record>>,
    fail_writes: bool,
}

impl MemorySink {
    /// Create an empty sink named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Vec::new()),
            fail_writes: false,
        }
    }

    /// Create a sink whose every write returns an error.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(name)
        }
    }

    /// Snapshot of the records delivered so far.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Remove and return the records delivered so far.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// `true` when no record has been delivered.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, record: &Record) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::write(&self.name, "write failure injected"));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
