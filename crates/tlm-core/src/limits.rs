//! Default sizes and names shared by the logger crates.
//!
//! Every bounded structure in the logger is sized from here unless the
//! configuration says otherwise, so the memory budget of a default run is
//! readable in one place.

/// Origin stamped on records when the configuration does not name one.
pub const DEFAULT_ORIGIN: &str = "TelemetryApp";

/// Worker threads in the pool. Two run the producer and consumer; the rest is headroom.
pub const DEFAULT_WORKERS: usize = 3;

/// Pending-task slots in the worker pool queue.
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 16;

/// Records buffered between producer and consumer.
pub const DEFAULT_SHARED_QUEUE_CAPACITY: usize = 200;

/// Records buffered inside the record store between flushes.
pub const DEFAULT_STORE_CAPACITY: usize = 100;
