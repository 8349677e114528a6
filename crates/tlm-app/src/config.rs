//! Application configuration.
//!
//! Loaded from a TOML file, then overridden by `TLM_`-prefixed environment
//! variables, with `__` separating nested keys:
//!
//! ```text
//! TLM_LOG_LEVEL=debug
//! TLM_SOURCE__KIND=system
//! TLM_PIPELINE__STORE_CAPACITY=50
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration: a
//! script source with no samples logging to the console.
//!
//! # Example
//! ```no_run
//! use tlm_app::config::AppConfig;
//!
//! let config = AppConfig::load_from("telemetry.toml")?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::pipeline::{FlushPolicy, PipelineOptions};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tlm_core::limits::{
    DEFAULT_ORIGIN, DEFAULT_SHARED_QUEUE_CAPACITY, DEFAULT_STORE_CAPACITY,
    DEFAULT_TASK_QUEUE_CAPACITY, DEFAULT_WORKERS,
};
use tlm_core::{ThresholdPolicy, TlmError, TlmResult};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TLM_";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Stamped on every record as its origin.
    pub origin: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Sample source and classification.
    pub source: SourceConfig,
    /// Record destinations.
    pub sinks: SinksConfig,
    /// Queue, store and thread sizing.
    pub pipeline: PipelineConfig,
}

/// Kind of telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Newline-separated samples from a file.
    File,
    /// Newline-separated samples from a unix stream socket.
    Socket,
    /// Live host measurements.
    System,
    /// Samples listed in the configuration.
    Script,
}

impl SourceKind {
    /// Lower-case name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Socket => "socket",
            SourceKind::System => "system",
            SourceKind::Script => "script",
        }
    }
}

/// Where samples come from and how they are classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Which source to build.
    pub kind: SourceKind,
    /// File or socket path.
    pub path: Option<PathBuf>,
    /// Policy for single-value samples (cpu, ram, temp).
    pub policy: String,
    /// Policies for `;`-separated multi-value samples, in field order.
    /// Takes precedence over `policy` when set.
    pub mapping: Option<Vec<String>>,
    /// Samples replayed by the script source.
    pub samples: Vec<String>,
    /// Samples taken by the system source; 0 means unbounded.
    pub limit: u64,
    /// Producer pause after each sample, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Field order of samples produced by the system source.
pub const SYSTEM_MAPPING: [&str; 3] = ["cpu", "temp", "ram"];

impl SourceConfig {
    /// The effective multi-value mapping, if samples are multi-value.
    ///
    /// The system source always produces `cpu;temp;ram` samples.
    pub fn effective_mapping(&self) -> Option<Vec<String>> {
        match (&self.mapping, self.kind) {
            (Some(mapping), _) => Some(mapping.clone()),
            (None, SourceKind::System) => {
                Some(SYSTEM_MAPPING.iter().map(|s| s.to_string()).collect())
            }
            (None, _) => None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Script,
            path: None,
            policy: "cpu".to_string(),
            mapping: None,
            samples: Vec::new(),
            limit: 10,
            poll_interval_ms: 0,
        }
    }
}

/// Record destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Echo records to stdout.
    pub console: bool,
    /// Log files, in registration order.
    pub file: Vec<FileSinkConfig>,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            console: true,
            file: Vec::new(),
        }
    }
}

/// One log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// File to write.
    pub path: PathBuf,
    /// Only records of this context are written.
    #[serde(default)]
    pub context: Option<String>,
    /// Append to an existing file instead of truncating it.
    #[serde(default)]
    pub append: bool,
}

/// Queue, store and thread sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pool threads; at least two.
    pub workers: usize,
    /// Pending-task slots of the pool.
    pub task_queue_capacity: usize,
    /// Records queued between producer and consumer.
    pub shared_queue_capacity: usize,
    /// Records buffered by the store between flushes.
    pub store_capacity: usize,
    /// When the consumer flushes.
    pub flush: FlushPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            shared_queue_capacity: DEFAULT_SHARED_QUEUE_CAPACITY,
            store_capacity: DEFAULT_STORE_CAPACITY,
            flush: FlushPolicy::EveryRecord,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            log_level: "info".to_string(),
            source: SourceConfig::default(),
            sinks: SinksConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Defaults, then the TOML file at `path`, then `TLM_` environment variables.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file contributes nothing; callers that require the file
    /// must check for it first.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(contents))
            .extract()
    }

    /// Render the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> TlmResult<()> {
        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LEVELS.join(", ")
            ));
        }
        if self.origin.trim().is_empty() {
            return invalid("origin must not be empty");
        }

        self.validate_source()?;
        self.validate_pipeline()?;

        for sink in &self.sinks.file {
            if sink.path.as_os_str().is_empty() {
                return invalid("file sink path must not be empty");
            }
        }
        Ok(())
    }

    fn validate_source(&self) -> TlmResult<()> {
        let source = &self.source;
        if matches!(source.kind, SourceKind::File | SourceKind::Socket) && source.path.is_none() {
            return invalid(format!("{} source requires a path", source.kind.as_str()));
        }

        match source.effective_mapping() {
            Some(mapping) => {
                if mapping.is_empty() {
                    return invalid("source mapping must name at least one policy");
                }
                let mut seen = HashSet::new();
                for name in &mapping {
                    check_policy_name(name)?;
                    if !seen.insert(name.to_lowercase()) {
                        return invalid(format!("policy '{name}' appears twice in mapping"));
                    }
                }
            }
            None => check_policy_name(&source.policy)?,
        }
        Ok(())
    }

    fn validate_pipeline(&self) -> TlmResult<()> {
        self.pipeline_options()
            .validate()
            .map_err(|e| TlmError::Configuration(e.to_string()))
    }

    /// Sizing and cadence handed to the pipeline.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            workers: self.pipeline.workers,
            task_queue_capacity: self.pipeline.task_queue_capacity,
            shared_queue_capacity: self.pipeline.shared_queue_capacity,
            store_capacity: self.pipeline.store_capacity,
            flush: self.pipeline.flush,
            poll_interval: Duration::from_millis(self.source.poll_interval_ms),
        }
    }
}

fn check_policy_name(name: &str) -> TlmResult<()> {
    if ThresholdPolicy::by_name(name).is_none() {
        return invalid(format!(
            "Unknown policy '{}'. Must be one of: {}",
            name,
            ThresholdPolicy::BUILTIN_NAMES.join(", ")
        ));
    }
    Ok(())
}

fn invalid<T>(message: impl Into<String>) -> TlmResult<T> {
    Err(TlmError::Configuration(message.into()))
}
