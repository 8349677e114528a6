//! Turns an [`AppConfig`] into a ready-to-run [`Pipeline`].
//!
//! The assembling layer owns the source and the sinks; each pipeline it
//! builds only borrows them through shared handles, so the same `App` can
//! run several times (each run reopens the source).

use crate::config::{AppConfig, SourceKind};
use crate::pipeline::Pipeline;
use anyhow::{bail, ensure, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tlm_core::{
    shared_source, ClassificationPolicy, MultiValue, SampleClassifier, SharedSink, SharedSource,
    SingleValue, ThresholdPolicy,
};
use tlm_sources::{FileSource, ScriptedSource, SystemSource};
use tlm_storage::{ConsoleSink, FileSink};
use tracing::{debug, info};

/// Read, merge and validate the configuration at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    ensure!(
        path.is_file(),
        "configuration file not found: {}",
        path.display()
    );
    let config = AppConfig::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Collaborators assembled from configuration.
pub struct App {
    config: AppConfig,
    source: SharedSource,
    classifier: Arc<dyn SampleClassifier>,
    sinks: Vec<SharedSink>,
}

impl App {
    /// Validate `config` and build its source, classifier and sinks.
    ///
    /// # Errors
    /// Fails on invalid configuration, unknown policy names, or a log file
    /// that cannot be opened.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let classifier = build_classifier(&config)?;
        let source = build_source(&config)?;
        let sinks = build_sinks(&config)?;
        info!(
            source = config.source.kind.as_str(),
            sinks = sinks.len(),
            origin = %config.origin,
            "application assembled"
        );
        Ok(Self {
            config,
            source,
            classifier,
            sinks,
        })
    }

    /// A new pipeline run over this application's source and sinks.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let pipeline = Pipeline::new(
            Arc::clone(&self.source),
            Arc::clone(&self.classifier),
            self.sinks.clone(),
            self.config.pipeline_options(),
        )?;
        Ok(pipeline)
    }

    /// Configuration this application was built from.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sinks in registration order.
    pub fn sinks(&self) -> &[SharedSink] {
        &self.sinks
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinks: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("App")
            .field("source", &self.source.lock().name())
            .field("sinks", &sinks)
            .finish()
    }
}

fn policy(name: &str, origin: &str) -> Result<Arc<dyn ClassificationPolicy>> {
    let Some(policy) = ThresholdPolicy::by_name(name) else {
        bail!("unknown classification policy '{name}'");
    };
    Ok(Arc::new(policy.with_origin(origin)))
}

/// Classifier for the configured policy or multi-value mapping.
pub fn build_classifier(config: &AppConfig) -> Result<Arc<dyn SampleClassifier>> {
    let origin = config.origin.as_str();
    match config.source.effective_mapping() {
        Some(mapping) => {
            let policies = mapping
                .iter()
                .map(|name| policy(name, origin))
                .collect::<Result<Vec<_>>>()?;
            debug!(fields = policies.len(), "multi-value classifier");
            Ok(Arc::new(MultiValue::new(policies)?))
        }
        None => Ok(Arc::new(SingleValue::new(policy(
            &config.source.policy,
            origin,
        )?))),
    }
}

/// Source of the configured kind, not yet opened.
pub fn build_source(config: &AppConfig) -> Result<SharedSource> {
    let source = &config.source;
    let required_path = || {
        source
            .path
            .clone()
            .with_context(|| format!("{} source requires a path", source.kind.as_str()))
    };
    let shared = match source.kind {
        SourceKind::File => shared_source(FileSource::new(required_path()?)),
        SourceKind::Socket => socket_source(required_path()?)?,
        SourceKind::System => shared_source(SystemSource::new(source.limit)),
        SourceKind::Script => shared_source(ScriptedSource::new(source.samples.iter().cloned())),
    };
    Ok(shared)
}

#[cfg(unix)]
fn socket_source(path: std::path::PathBuf) -> Result<SharedSource> {
    Ok(shared_source(tlm_sources::SocketSource::new(path)))
}

#[cfg(not(unix))]
fn socket_source(path: std::path::PathBuf) -> Result<SharedSource> {
    bail!(
        "socket source ({}) requires a unix platform",
        path.display()
    )
}

/// Console sink first when enabled, then file sinks in configuration order.
pub fn build_sinks(config: &AppConfig) -> Result<Vec<SharedSink>> {
    let mut sinks: Vec<SharedSink> = Vec::new();
    if config.sinks.console {
        sinks.push(Arc::new(ConsoleSink::new()));
    }
    for file in &config.sinks.file {
        let sink = if file.append {
            FileSink::append(&file.path)
        } else {
            FileSink::create(&file.path)
        }
        .with_context(|| format!("failed to open log file {}", file.path.display()))?;
        let sink = match &file.context {
            Some(context) => sink.with_context(context.clone()),
            None => sink,
        };
        sinks.push(Arc::new(sink));
    }
    if sinks.is_empty() {
        tracing::warn!("no sinks configured; records will be discarded");
    }
    Ok(sinks)
}
