//! Core types and traits for the telemetry logger.
//!
//! - [`BoundedRing`]: fixed-capacity FIFO that overwrites its oldest entry
//! - [`Record`] / [`Severity`]: the classified event delivered to sinks
//! - [`policy`]: threshold classification of raw samples
//! - [`capabilities`]: the [`TelemetrySource`] and [`Sink`] traits
//! - [`error`]: construction, source and sink errors

pub mod capabilities;
pub mod error;
pub mod limits;
pub mod policy;
pub mod record;
pub mod ring;

pub use capabilities::{shared_source, SharedSink, SharedSource, Sink, TelemetrySource};
pub use error::{
    SinkError, SinkErrorKind, SourceError, SourceErrorKind, TlmError, TlmResult,
};
pub use policy::{ClassificationPolicy, MultiValue, SampleClassifier, SingleValue, ThresholdPolicy};
pub use record::{current_timestamp, Record, Severity, TIMESTAMP_FORMAT};
pub use ring::BoundedRing;
