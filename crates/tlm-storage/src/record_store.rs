//! Buffered fan-out of records to sinks.
//!
//! [`RecordStore`] holds a [`BoundedRing`] of records and an ordered list of
//! sinks. `log` buffers; `flush` empties the buffer oldest-first and hands
//! each record to every sink in registration order before moving on to the
//! next record.
//!
//! # Thread Safety
//!
//! The store is meant for a single writer (the pipeline consumer) and takes
//! `&mut self` for everything that changes it. Share it behind a lock if more
//! than one thread must log or flush.
//!
//! # Failure Isolation
//!
//! A sink that returns an error, or panics, loses that one delivery. The
//! failure is logged and counted in [`FlushReport::sink_failures`]; the
//! remaining sinks and records are still delivered.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tlm_core::{BoundedRing, Record, SharedSink, Sink, SinkError, TlmError, TlmResult};
use tracing::{debug, trace, warn};

/// Outcome of one [`RecordStore::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records removed from the buffer.
    pub records: usize,
    /// Successful `write` calls across all sinks.
    pub deliveries: usize,
    /// Failed `write` or `flush` calls across all sinks.
    pub sink_failures: usize,
}

impl FlushReport {
    /// Add another report's counts into this one.
    pub fn merge(&mut self, other: FlushReport) {
        self.records += other.records;
        self.deliveries += other.deliveries;
        self.sink_failures += other.sink_failures;
    }
}

/// Bounded record buffer that fans records out to an ordered list of sinks.
pub struct RecordStore {
    buffer: BoundedRing<Record>,
    sinks: Vec<SharedSink>,
    overwritten: u64,
}

impl RecordStore {
    /// Create a store with no sinks.
    ///
    /// # Errors
    /// Returns [`TlmError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> TlmResult<Self> {
        if capacity == 0 {
            return Err(TlmError::ZeroCapacity {
                what: "record store",
            });
        }
        Ok(Self {
            buffer: BoundedRing::new(capacity)?,
            sinks: Vec::new(),
            overwritten: 0,
        })
    }

    /// Start a [`RecordStoreBuilder`] for a store of `capacity` records.
    pub fn builder(capacity: usize) -> RecordStoreBuilder {
        RecordStoreBuilder::new(capacity)
    }

    /// Append a sink; it receives every record flushed from now on.
    pub fn add_sink(&mut self, sink: SharedSink) {
        debug!(sink = sink.name(), "sink registered");
        self.sinks.push(sink);
    }

    /// Buffer a record.
    ///
    /// Returns `false` if the buffer was full and its oldest unflushed record
    /// was overwritten.
    pub fn log(&mut self, record: Record) -> bool {
        let kept = self.buffer.push(record);
        if !kept {
            self.overwritten += 1;
            debug!(
                capacity = self.buffer.capacity(),
                overwritten = self.overwritten,
                "record store full; oldest record overwritten"
            );
        }
        kept
    }

    /// Deliver every buffered record to every sink, oldest record first.
    pub fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        let Self { buffer, sinks, .. } = self;

        for record in buffer.drain() {
            report.records += 1;
            for sink in sinks.iter() {
                match deliver(sink.as_ref(), &record) {
                    Ok(()) => report.deliveries += 1,
                    Err(e) => {
                        report.sink_failures += 1;
                        warn!(sink = sink.name(), error = %e, "sink write failed");
                    }
                }
            }
        }

        if report.records > 0 {
            for sink in sinks.iter() {
                if let Err(e) = flush_sink(sink.as_ref()) {
                    report.sink_failures += 1;
                    warn!(sink = sink.name(), error = %e, "sink flush failed");
                }
            }
        }

        trace!(
            records = report.records,
            deliveries = report.deliveries,
            failures = report.sink_failures,
            "record store flushed"
        );
        report
    }

    /// Discard all buffered records without delivering them.
    ///
    /// Returns how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Records currently buffered.
    pub fn count(&self) -> usize {
        self.buffer.len()
    }

    /// `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of buffered records.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Records lost to overflow since the store was created.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinks: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("RecordStore")
            .field("count", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .field("sinks", &sinks)
            .field("overwritten", &self.overwritten)
            .finish()
    }
}

fn deliver(sink: &dyn Sink, record: &Record) -> Result<(), SinkError> {
    match catch_unwind(AssertUnwindSafe(|| sink.write(record))) {
        Ok(result) => result,
        Err(_) => Err(SinkError::write(sink.name(), "sink panicked during write")),
    }
}

fn flush_sink(sink: &dyn Sink) -> Result<(), SinkError> {
    match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
        Ok(result) => result,
        Err(_) => Err(SinkError::flush(sink.name(), "sink panicked during flush")),
    }
}

/// Accumulates capacity and sinks, then produces a [`RecordStore`].
#[derive(Default)]
pub struct RecordStoreBuilder {
    capacity: usize,
    sinks: Vec<SharedSink>,
}

impl RecordStoreBuilder {
    /// Builder for a store of `capacity` records and no sinks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sinks: Vec::new(),
        }
    }

    /// Override the buffer capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Append one sink.
    #[must_use]
    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append several sinks, keeping their order.
    #[must_use]
    pub fn sinks(mut self, sinks: impl IntoIterator<Item = SharedSink>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Build the store.
    ///
    /// # Errors
    /// Returns [`TlmError::ZeroCapacity`] if the capacity is 0.
    pub fn build(self) -> TlmResult<RecordStore> {
        let mut store = RecordStore::new(self.capacity)?;
        for sink in self.sinks {
            store.add_sink(sink);
        }
        Ok(store)
    }
}
