//! Pipeline errors.

use thiserror::Error;
use tlm_core::{SourceError, TlmError};
use tlm_pool::PoolError;

/// Why a pipeline could not be assembled or run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Options that cannot produce a working pipeline.
    #[error("Invalid pipeline options: {0}")]
    InvalidOptions(String),

    /// The shared queue or record store could not be built.
    #[error(transparent)]
    Construction(#[from] TlmError),

    /// The worker pool could not be built or refused a task.
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// The telemetry source failed to open; nothing was sampled.
    #[error("Telemetry source failed to open: {0}")]
    SourceOpen(#[source] SourceError),
}
