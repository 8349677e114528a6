//! Error types shared by the telemetry logger crates.
//!
//! Three families are kept apart:
//!
//! - **`TlmError`**: construction and configuration failures. These are fatal
//!   and surface immediately to whoever builds a component (zero capacity,
//!   inconsistent thresholds, invalid settings).
//! - **`SourceError`**: a telemetry source could not be opened or read. The
//!   pipeline treats a read failure as end-of-stream for the current run.
//! - **`SinkError`**: a sink could not write or flush a record. The record
//!   store contains these per sink so one broken sink never blocks the others.
//!
//! Capacity overflow is deliberately absent: overwriting the oldest element of
//! a bounded ring is reported through return values, never as an error.

use thiserror::Error;

/// Convenience alias for results using the core error type.
pub type TlmResult<T> = std::result::Result<T, TlmError>;

/// Construction and configuration errors.
#[derive(Error, Debug)]
pub enum TlmError {
    /// A bounded container or pool was asked for zero slots.
    #[error("{what} capacity must be greater than zero")]
    ZeroCapacity {
        /// Which component was being constructed.
        what: &'static str,
    },

    /// Classification thresholds are not ordered `0 <= warning <= critical <= max`.
    #[error(
        "invalid thresholds for {context}: warning={warning}, critical={critical}, max={max_value}"
    )]
    InvalidThresholds {
        /// Telemetry context the policy classifies.
        context: String,
        /// Threshold above which a value is a warning.
        warning: f32,
        /// Threshold above which a value is critical.
        critical: f32,
        /// Largest valid value.
        max_value: f32,
    },

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which source operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Acquiring the underlying device, file or socket.
    Open,
    /// Producing the next sample.
    Read,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceErrorKind::Open => "open",
            SourceErrorKind::Read => "read",
        };
        write!(f, "{}", label)
    }
}

/// A telemetry source failed to open or to produce a sample.
#[derive(Error, Debug, Clone)]
#[error("Source '{source_name}' {kind} error: {message}")]
pub struct SourceError {
    /// Name of the failing source.
    pub source_name: String,
    /// Operation that failed.
    pub kind: SourceErrorKind,
    /// Underlying cause.
    pub message: String,
}

impl SourceError {
    /// Error of any kind.
    pub fn new(
        source_name: impl Into<String>,
        kind: SourceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            message: message.into(),
        }
    }

    /// Open failure.
    pub fn open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, SourceErrorKind::Open, message)
    }

    /// Read failure.
    pub fn read(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, SourceErrorKind::Read, message)
    }
}

/// Which sink operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// Delivering one record.
    Write,
    /// Pushing buffered output to its destination.
    Flush,
}

impl std::fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SinkErrorKind::Write => "write",
            SinkErrorKind::Flush => "flush",
        };
        write!(f, "{}", label)
    }
}

/// A sink failed to persist or flush a record.
#[derive(Error, Debug, Clone)]
#[error("Sink '{sink}' {kind} error: {message}")]
pub struct SinkError {
    /// Name of the failing sink.
    pub sink: String,
    /// Operation that failed.
    pub kind: SinkErrorKind,
    /// Underlying cause.
    pub message: String,
}

impl SinkError {
    /// Error of any kind.
    pub fn new(sink: impl Into<String>, kind: SinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            kind,
            message: message.into(),
        }
    }

    /// Write failure.
    pub fn write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(sink, SinkErrorKind::Write, message)
    }

    /// Flush failure.
    pub fn flush(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(sink, SinkErrorKind::Flush, message)
    }
}
