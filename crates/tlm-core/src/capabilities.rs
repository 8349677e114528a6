//! Capability traits for the collaborators plugged into the pipeline.
//!
//! Sources and sinks are strategy objects. The pipeline only ever sees these
//! small traits, never a concrete file, socket or console:
//!
//! - A [`TelemetrySource`] produces raw sample strings on demand.
//! - A [`Sink`] durably or visibly records a [`Record`].
//!
//! Both are shared with the pipeline through `Arc`s ([`SharedSource`],
//! [`SharedSink`]). The assembling layer keeps its own handles; the pipeline
//! never closes or tears a collaborator down.
//!
//! # Example
//!
//! ```rust
//! use tlm_core::capabilities::{Sink, TelemetrySource};
//! use tlm_core::{Record, SinkError, SourceError};
//!
//! struct Countdown(u32);
//!
//! impl TelemetrySource for Countdown {
//!     fn name(&self) -> &str { "countdown" }
//!     fn open(&mut self) -> Result<(), SourceError> { Ok(()) }
//!     fn read_sample(&mut self) -> Result<Option<String>, SourceError> {
//!         if self.0 == 0 {
//!             return Ok(None);
//!         }
//!         self.0 -= 1;
//!         Ok(Some(self.0.to_string()))
//!     }
//! }
//!
//! struct Stdout;
//!
//! impl Sink for Stdout {
//!     fn name(&self) -> &str { "stdout" }
//!     fn write(&self, record: &Record) -> Result<(), SinkError> {
//!         println!("{record}");
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::{SinkError, SourceError};
use crate::record::Record;
use parking_lot::Mutex;
use std::sync::Arc;

/// A producer of raw telemetry samples.
///
/// `read_sample` may block (file I/O, socket reads, sampling delays); the
/// producer task is the only caller while a pipeline runs.
pub trait TelemetrySource: Send {
    /// Human-readable identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Prepare the source for reading. Called once per pipeline run.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Read one raw sample.
    ///
    /// `Ok(None)` means the source is exhausted. An `Err` is also treated as
    /// end-of-stream by the pipeline; retrying belongs to the source.
    fn read_sample(&mut self) -> Result<Option<String>, SourceError>;
}

/// A destination for classified records.
///
/// Sinks are shared by reference and must do their own interior locking.
/// A failing `write` affects only that sink and that record.
pub trait Sink: Send + Sync {
    /// Human-readable identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Deliver one record.
    fn write(&self, record: &Record) -> Result<(), SinkError>;

    /// Push buffered output to its destination. Called at the end of every
    /// record-store flush.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A source shared between the assembling layer and the producer task.
pub type SharedSource = Arc<Mutex<dyn TelemetrySource>>;

/// A sink shared between the assembling layer and the record store.
pub type SharedSink = Arc<dyn Sink>;

/// Wrap a concrete source for hand-off to the pipeline.
pub fn shared_source<S: TelemetrySource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}
