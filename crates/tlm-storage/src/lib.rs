//! Record buffering and sink fan-out for the telemetry logger.
//!
//! - [`RecordStore`] / [`RecordStoreBuilder`]: bounded record buffer that
//!   flushes to every registered sink
//! - [`ConsoleSink`], [`FileSink`], [`MemorySink`]: sink strategies

pub mod console_sink;
pub mod file_sink;
pub mod memory_sink;
pub mod record_store;

pub use console_sink::ConsoleSink;
pub use file_sink::FileSink;
pub use memory_sink::MemorySink;
pub use record_store::{FlushReport, RecordStore, RecordStoreBuilder};
