//! Telemetry logger application layer.
//!
//! - [`config`]: figment-based configuration (TOML file + `TLM_` environment)
//! - [`tracing_setup`]: global tracing subscriber
//! - [`pipeline`]: producer/consumer orchestrator over a worker pool
//! - [`app`]: assembly of sources, classifiers and sinks from configuration

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod tracing_setup;

pub use app::{load_config, App};
pub use config::AppConfig;
pub use error::PipelineError;
pub use pipeline::{
    EndReason, FlushPolicy, Pipeline, PipelineOptions, PipelineReport, RunPhase, StopHandle,
};
