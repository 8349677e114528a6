//! Terminal sink.

use std::io::Write;
use tlm_core::{Record, Sink, SinkError};

/// Writes each record's display line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Create a console sink.
    pub fn new() -> Self {
        Self
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, record: &Record) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{record}").map_err(|e| SinkError::write(self.name(), e.to_string()))
    }

    fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout()
            .flush()
            .map_err(|e| SinkError::flush(self.name(), e.to_string()))
    }
}
