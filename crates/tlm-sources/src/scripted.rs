//! Scripted source for tests and dry runs.
//!
//! Replays a fixed list of raw samples. Faults can be injected at open time
//! or after a given number of samples, and a per-sample delay simulates a
//! slow device.

use std::time::Duration;
use tlm_core::{SourceError, TelemetrySource};

/// Replays a fixed list of samples, optionally with injected faults.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    name: String,
    script: Vec<String>,
    cursor: usize,
    fail_on_open: bool,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    opens: usize,
}

impl ScriptedSource {
    /// Source replaying `samples` in order.
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "script".to_string(),
            script: samples.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Rename the source.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every `open` fail.
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    /// Return a read error once `count` samples have been produced.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Sleep for `delay` before producing each sample.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How often `open` has been called.
    pub fn opens(&self) -> usize {
        self.opens
    }

    /// Samples not yet produced.
    pub fn remaining(&self) -> usize {
        self.script.len().saturating_sub(self.cursor)
    }
}

impl TelemetrySource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.opens += 1;
        if self.fail_on_open {
            return Err(SourceError::open(&self.name, "open failure injected"));
        }
        self.cursor = 0;
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<String>, SourceError> {
        if self.fail_after == Some(self.cursor) {
            return Err(SourceError::read(
                &self.name,
                format!("read failure injected after {} samples", self.cursor),
            ));
        }
        let Some(sample) = self.script.get(self.cursor).cloned() else {
            return Ok(None);
        };
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.cursor += 1;
        Ok(Some(sample))
    }
}
